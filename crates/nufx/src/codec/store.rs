//! The identity codec: copies bytes through unchanged while accumulating
//! their CRC-16 (`spec.md` §4.D "Store").

use std::io::{Read, Write};

use crate::byteio::Crc16;
use crate::error::Result;

use super::{DecodeResult, EncodeResult};

pub fn encode(src: &mut dyn Read, dst: &mut dyn Write, len: u64) -> Result<EncodeResult> {
    let mut crc = Crc16::new();
    let mut remaining = len;
    let mut buf = [0u8; 8192];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        src.read_exact(&mut buf[..want])?;
        crc = Crc16::update(crc, &buf[..want]);
        dst.write_all(&buf[..want])?;
        remaining -= want as u64;
    }
    Ok(EncodeResult {
        compressed_len: len,
        crc,
    })
}

pub fn decode(src: &mut dyn Read, dst: &mut dyn Write, len: u64) -> Result<DecodeResult> {
    let mut crc = Crc16::new();
    let mut remaining = len;
    let mut buf = [0u8; 8192];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        src.read_exact(&mut buf[..want])?;
        crc = Crc16::update(crc, &buf[..want]);
        dst.write_all(&buf[..want])?;
        remaining -= want as u64;
    }
    Ok(DecodeResult {
        uncompressed_len: len,
        crc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn store_roundtrip_preserves_crc() {
        let data = b"Hello, NuFX".to_vec();
        let mut src = Cursor::new(data.clone());
        let mut dst = Vec::new();
        let enc = encode(&mut src, &mut dst, data.len() as u64).unwrap();
        assert_eq!(dst, data);
        assert_eq!(enc.compressed_len, data.len() as u64);

        let mut src2 = Cursor::new(dst);
        let mut out = Vec::new();
        let dec = decode(&mut src2, &mut out, data.len() as u64).unwrap();
        assert_eq!(out, data);
        assert_eq!(dec.crc, enc.crc);
    }
}
