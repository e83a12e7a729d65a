//! Little-endian integer primitives and the CCITT CRC-16 used by every
//! NuFX header.
//!
//! Grounded in `spec.md` §4.A; the teacher's byte-at-a-time
//! `next_u16`/`next_u32` helpers (`crates/rar/src/lib.rs`,
//! `crates/zip/src/header/local_file.rs`) are the model for the reader
//! side, generalized here to a free function over any `Read` plus a
//! `seek-forward-only` helper that works whether or not the underlying
//! stream supports `Seek`.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u16_le<R: Read>(r: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_i16_le<R: Read>(r: &mut R) -> Result<i16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

pub fn read_u32_le<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

pub fn write_u16_le<W: Write>(w: &mut W, v: u16) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u32_le<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Advance a reader by `n` bytes whether or not it supports random-access
/// seeking: read-and-discard in fixed chunks. This is the single
/// abstraction streaming and random-access callers share (see design note
/// in `spec.md` §9, "Streaming vs random-access").
pub fn discard<R: Read>(r: &mut R, mut n: u64) -> Result<()> {
    let mut scratch = [0u8; 4096];
    while n > 0 {
        let chunk = n.min(scratch.len() as u64) as usize;
        r.read_exact(&mut scratch[..chunk])?;
        n -= chunk as u64;
    }
    Ok(())
}

/// CCITT CRC-16: poly 0x1021, init 0x0000, non-reflected, table-driven.
pub struct Crc16;

impl Crc16 {
    const TABLE: [u16; 256] = build_table();

    pub fn new() -> u16 {
        0x0000
    }

    pub fn update(crc: u16, data: &[u8]) -> u16 {
        let mut crc = crc;
        for &byte in data {
            let idx = (((crc >> 8) ^ byte as u16) & 0xff) as usize;
            crc = (crc << 8) ^ Self::TABLE[idx];
        }
        crc
    }

    pub fn of(data: &[u8]) -> u16 {
        Self::update(Self::new(), data)
    }
}

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Marker for a reader abstraction that only ever moves forward. Random
/// access streams implement `Seek` directly (via `std::io::Seek`);
/// streaming-only sources (pipes) only implement `Read` and use
/// `discard`. Parsers that need random access take `R: Read + Seek`;
/// parsers that don't, take only `R: Read`, so a single pipe-sourced
/// archive can still be listed/tested (`spec.md` §4.F "streaming mode").
pub trait ForwardSeek {
    fn skip(&mut self, n: u64) -> Result<()>;
}

impl<R: Read> ForwardSeek for R {
    fn skip(&mut self, n: u64) -> Result<()> {
        discard(self, n)
    }
}

pub fn io_err_to_error(e: io::Error) -> Error {
    Error::Io(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn crc16_empty_is_zero() {
        assert_eq!(Crc16::of(&[]), 0x0000);
    }

    #[test]
    fn crc16_known_vector() {
        // "123456789" is the standard check string for many CRC-16 variants.
        // For poly 0x1021 / init 0x0000 / non-reflected this is 0x31C3.
        assert_eq!(Crc16::of(b"123456789"), 0x31C3);
    }

    #[test]
    fn le_roundtrip() {
        let mut buf = Vec::new();
        write_u16_le(&mut buf, 0xABCD).unwrap();
        write_u32_le(&mut buf, 0xDEADBEEF).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u16_le(&mut cursor).unwrap(), 0xABCD);
        assert_eq!(read_u32_le(&mut cursor).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn discard_advances_stream_only_reader() {
        let data = b"0123456789".to_vec();
        let mut cursor = Cursor::new(data);
        discard(&mut cursor, 5).unwrap();
        let rest = read_bytes(&mut cursor, 5).unwrap();
        assert_eq!(rest, b"56789");
    }
}
