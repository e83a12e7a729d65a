//! LZC-12 / LZC-16: the `compress(1)`-style LZW variant NuFX archives
//! can also carry (`spec.md` §4.D), distinguished from LZW/1 and LZW/2
//! by MSB-first bit packing, a single dictionary spanning the whole
//! thread (no 4096-byte chunking), and a maximum code width of either 12
//! or 16 bits depending on format. Marked optional by the spec ("may
//! report UnsupportedFeature if omitted"); implemented here since the
//! corpus's archivers (see `examples/Its-its-archiver`) treat
//! unimplemented format variants as a hard error rather than silently
//! dropping data, and a stub would leave Binary II transfers carrying
//! these threads unreadable.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::byteio::Crc16;
use crate::error::{Error, Result};

use super::{DecodeResult, EncodeResult};

const CLEAR_CODE: u16 = 256;
const FIRST_FREE_CODE: u16 = 257;

pub fn encode(src: &mut dyn Read, dst: &mut dyn Write, len: u64, max_bits: u8) -> Result<EncodeResult> {
    if max_bits != 12 && max_bits != 16 {
        return Err(Error::UnsupportedFeature);
    }

    let mut data = Vec::with_capacity(len as usize);
    src.take(len).read_to_end(&mut data)?;
    let crc = Crc16::of(&data);

    let max_code: u32 = (1u32 << max_bits) - 1;
    let mut table: HashMap<Vec<u8>, u16> = HashMap::new();
    let mut next_code: u32 = FIRST_FREE_CODE as u32;
    let mut width: u8 = 9;

    let mut bits = MsbBitWriter::new();
    bits.push_bits(CLEAR_CODE as u32, width);

    let mut w: Vec<u8> = Vec::new();
    for &byte in &data {
        let mut wc = w.clone();
        wc.push(byte);
        if wc.len() == 1 || table.contains_key(&wc) {
            w = wc;
            continue;
        }

        bits.push_bits(code_of(&w, &table), width);

        if next_code <= max_code {
            table.insert(wc, next_code as u16);
            next_code += 1;
            if next_code > (1u32 << width) && width < max_bits {
                width += 1;
            }
        } else {
            bits.push_bits(CLEAR_CODE as u32, width);
            table.clear();
            next_code = FIRST_FREE_CODE as u32;
            width = 9;
        }
        w = vec![byte];
    }
    if !w.is_empty() {
        bits.push_bits(code_of(&w, &table), width);
    }

    let packed = bits.finish();
    dst.write_all(&packed)?;

    Ok(EncodeResult {
        compressed_len: packed.len() as u64,
        crc,
    })
}

pub fn decode(src: &mut dyn Read, dst: &mut dyn Write, comp_len: u64) -> Result<DecodeResult> {
    let mut packed = vec![0u8; comp_len as usize];
    src.read_exact(&mut packed)?;

    let mut bits = MsbBitReader::new(&packed);
    let mut dict: Vec<Vec<u8>> = (0..256u16).map(|b| vec![b as u8]).collect();
    let mut width: u8 = 9;
    let mut prev: Option<Vec<u8>> = None;
    let mut out = Vec::new();

    loop {
        let Some(code) = bits.try_read_bits(width) else {
            break;
        };
        if code as u16 == CLEAR_CODE {
            dict.truncate(256);
            width = 9;
            prev = None;
            continue;
        }

        let entry = if (code as usize) < dict.len() {
            dict[code as usize].clone()
        } else if code as usize == dict.len() {
            let mut e = prev.clone().ok_or(Error::BadData)?;
            let first = *e.first().ok_or(Error::BadData)?;
            e.push(first);
            e
        } else {
            return Err(Error::BadData);
        };

        out.extend_from_slice(&entry);

        if let Some(p) = &prev {
            let mut new_entry = p.clone();
            new_entry.push(entry[0]);
            dict.push(new_entry);
            if dict.len() > (1usize << width) && width < 16 {
                width += 1;
            }
        }
        prev = Some(entry);
    }

    dst.write_all(&out)?;
    let crc = Crc16::of(&out);
    Ok(DecodeResult {
        uncompressed_len: out.len() as u64,
        crc,
    })
}

fn code_of(w: &[u8], table: &HashMap<Vec<u8>, u16>) -> u32 {
    if w.len() == 1 {
        w[0] as u32
    } else {
        *table.get(w).expect("prefix string must already be in dictionary") as u32
    }
}

struct MsbBitWriter {
    bytes: Vec<u8>,
    cur: u32,
    nbits: u8,
}

impl MsbBitWriter {
    fn new() -> Self {
        MsbBitWriter {
            bytes: Vec::new(),
            cur: 0,
            nbits: 0,
        }
    }

    fn push_bits(&mut self, code: u32, width: u8) {
        self.cur = (self.cur << width) | (code & ((1u32 << width) - 1));
        self.nbits += width;
        while self.nbits >= 8 {
            let shift = self.nbits - 8;
            self.bytes.push(((self.cur >> shift) & 0xff) as u8);
            self.nbits -= 8;
        }
        self.cur &= (1u32 << self.nbits) - 1;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            let shift = 8 - self.nbits;
            self.bytes.push(((self.cur << shift) & 0xff) as u8);
        }
        self.bytes
    }
}

struct MsbBitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    cur: u32,
    nbits: u8,
}

impl<'a> MsbBitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        MsbBitReader {
            bytes,
            pos: 0,
            cur: 0,
            nbits: 0,
        }
    }

    fn try_read_bits(&mut self, width: u8) -> Option<u32> {
        while self.nbits < width {
            if self.pos >= self.bytes.len() {
                return None;
            }
            self.cur = (self.cur << 8) | self.bytes[self.pos] as u32;
            self.pos += 1;
            self.nbits += 8;
        }
        let shift = self.nbits - width;
        let value = (self.cur >> shift) & ((1u32 << width) - 1);
        self.nbits -= width;
        self.cur &= (1u32 << self.nbits) - 1;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn lzc12_roundtrip_text() {
        let data = b"abababababababab ababab the quick brown fox abababab".to_vec();
        let mut out = Vec::new();
        let enc = encode(&mut Cursor::new(data.clone()), &mut out, data.len() as u64, 12).unwrap();
        let mut decoded = Vec::new();
        let dec = decode(&mut Cursor::new(out), &mut decoded, enc.compressed_len).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(dec.crc, enc.crc);
    }

    #[test]
    fn lzc16_roundtrip_larger_input() {
        let data: Vec<u8> = (0..8000).map(|i| ((i * 7) % 61) as u8).collect();
        let mut out = Vec::new();
        let enc = encode(&mut Cursor::new(data.clone()), &mut out, data.len() as u64, 16).unwrap();
        let mut decoded = Vec::new();
        let dec = decode(&mut Cursor::new(out), &mut decoded, enc.compressed_len).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(dec.crc, enc.crc);
    }

    #[test]
    fn rejects_unsupported_width() {
        let data = b"abc".to_vec();
        let mut out = Vec::new();
        let err = encode(&mut Cursor::new(data.clone()), &mut out, data.len() as u64, 10).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature));
    }
}
