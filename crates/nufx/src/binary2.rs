//! Binary II (BNY) decoder (`spec.md` §4.I, §6): a concatenation of
//! 128-byte-header entries, each optionally followed by SQueezed or
//! verbatim content, read from a forward-only stream (no seeking —
//! `spec.md` §9 "Streaming vs random-access").

use std::io::Read;

use crate::byteio::discard;
use crate::codec::sq;
use crate::error::{Error, Result};

const BLOCK_LEN: usize = 128;
const SQ_MAGIC_LE: [u8; 2] = [0x76, 0xFF];
const PRODOS_DIRECTORY_TYPE: u8 = 0x0F;
const DIRECTORY_STORAGE_TYPE: u8 = 0x0D;

#[derive(Debug, Clone)]
pub struct Binary2Header {
    pub access: u8,
    pub file_type: u8,
    pub aux_type: u16,
    pub storage_type: u8,
    pub size_blocks: u16,
    pub mod_date: u16,
    pub mod_time: u16,
    pub create_date: u16,
    pub create_time: u16,
    pub eof: u32,
    pub filename: String,
    pub native_name: Option<String>,
    pub os_type: u8,
    pub native_file_type: u16,
    pub phantom_flag: u8,
    pub data_flags: u8,
    pub version: u8,
    pub files_to_follow: u8,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataFlags: u8 {
        const COMPRESSED = 0b1000_0000;
        const ENCRYPTED  = 0b0100_0000;
        const SPARSE     = 0b0000_0001;
    }
}

impl Binary2Header {
    pub fn is_directory(&self) -> bool {
        self.file_type == PRODOS_DIRECTORY_TYPE || self.storage_type == DIRECTORY_STORAGE_TYPE
    }

    pub fn is_compressed(&self) -> bool {
        DataFlags::from_bits_truncate(self.data_flags).contains(DataFlags::COMPRESSED)
    }
}

/// One decoded entry: its header plus, unless it was a directory, the
/// resulting bytes (already un-SQueezed if the content declared the SQ
/// magic).
pub struct Entry {
    pub header: Binary2Header,
    pub content: Option<Vec<u8>>,
}

/// This crate's layout for the 128 header bytes. `spec.md` §4.I pins
/// only a handful of absolute offsets (the three signature bytes, the
/// `0x02` ID byte at 18, the filename length at 23, the EOF extension
/// byte at 116, and `filesToFollow` at 127); the remaining field
/// positions below are this crate's own consistent arrangement of the
/// fields the spec names, documented in `DESIGN.md`.
mod offset {
    pub const ACCESS: usize = 3;
    pub const FILE_TYPE: usize = 4;
    pub const AUX_TYPE: usize = 5;
    pub const STORAGE_TYPE: usize = 7;
    pub const SIZE_BLOCKS: usize = 8;
    pub const MOD_DATE: usize = 10;
    pub const MOD_TIME: usize = 12;
    pub const CREATE_DATE: usize = 14;
    pub const CREATE_TIME: usize = 16;
    pub const ID_BYTE: usize = 18;
    pub const EOF_LOW: usize = 19;
    pub const NAME_LEN: usize = 23;
    pub const NAME: usize = 24;
    pub const NAME_CAP: usize = 64;
    pub const NATIVE_NAME_LEN: usize = 90;
    pub const NATIVE_NAME: usize = 91;
    pub const NATIVE_NAME_CAP: usize = 16;
    pub const OS_TYPE: usize = 107;
    pub const NATIVE_FILE_TYPE: usize = 108;
    pub const PHANTOM_FLAG: usize = 110;
    pub const DATA_FLAGS: usize = 111;
    pub const EOF_HIGH: usize = 116;
    pub const VERSION: usize = 120;
    pub const FILES_TO_FOLLOW: usize = 127;
}

fn read_header<R: Read>(r: &mut R) -> Result<Binary2Header> {
    let mut block = [0u8; BLOCK_LEN];
    r.read_exact(&mut block)?;

    if block[0] != 0x0A || block[1] != 0x47 || block[2] != 0x4C || block[offset::ID_BYTE] != 0x02 {
        return Err(Error::BadRecord);
    }

    let u16_at = |o: usize| u16::from_le_bytes([block[o], block[o + 1]]);

    let access = block[offset::ACCESS];
    let file_type = block[offset::FILE_TYPE];
    let aux_type = u16_at(offset::AUX_TYPE);
    let storage_type = block[offset::STORAGE_TYPE];
    let size_blocks = u16_at(offset::SIZE_BLOCKS);
    let mod_date = u16_at(offset::MOD_DATE);
    let mod_time = u16_at(offset::MOD_TIME);
    let create_date = u16_at(offset::CREATE_DATE);
    let create_time = u16_at(offset::CREATE_TIME);
    let eof_low = u16_at(offset::EOF_LOW);

    let name_len = (block[offset::NAME_LEN] as usize).min(offset::NAME_CAP);
    let filename = String::from_utf8_lossy(&block[offset::NAME..offset::NAME + name_len]).into_owned();

    let native_len = (block[offset::NATIVE_NAME_LEN] as usize).min(offset::NATIVE_NAME_CAP);
    let native_name = if native_len > 0 {
        Some(String::from_utf8_lossy(&block[offset::NATIVE_NAME..offset::NATIVE_NAME + native_len]).into_owned())
    } else {
        None
    };

    let os_type = block[offset::OS_TYPE];
    let native_file_type = u16_at(offset::NATIVE_FILE_TYPE);
    let phantom_flag = block[offset::PHANTOM_FLAG];
    let data_flags = block[offset::DATA_FLAGS];
    let eof_high = block[offset::EOF_HIGH];
    let version = block[offset::VERSION];
    let files_to_follow = block[offset::FILES_TO_FOLLOW];

    let eof = eof_low as u32 | ((eof_high as u32) << 16);

    Ok(Binary2Header {
        access,
        file_type,
        aux_type,
        storage_type,
        size_blocks,
        mod_date,
        mod_time,
        create_date,
        create_time,
        eof,
        filename,
        native_name,
        os_type,
        native_file_type,
        phantom_flag,
        data_flags,
        version,
        files_to_follow,
    })
}

/// Reads every entry from a BNY stream, validating (but only warning on
/// mismatch, per `spec.md` §9's documented source quirk) the
/// `filesToFollow` countdown.
pub fn read_all<R: Read>(r: &mut R) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut expected_remaining: Option<u8> = None;

    loop {
        let header = match read_header(r) {
            Ok(h) => h,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };

        if let Some(expected) = expected_remaining {
            if header.files_to_follow != expected {
                tracing::warn!(
                    expected,
                    actual = header.files_to_follow,
                    "BNY filesToFollow mismatch"
                );
            }
        }
        expected_remaining = header.files_to_follow.checked_sub(1);

        let content = if header.is_directory() {
            None
        } else {
            Some(read_entry_content(r, &header)?)
        };

        let done = header.files_to_follow == 0;
        entries.push(Entry { header, content });
        if done {
            break;
        }
    }

    Ok(entries)
}

fn read_entry_content<R: Read>(r: &mut R, header: &Binary2Header) -> Result<Vec<u8>> {
    let total_blocks = ((header.eof as usize) + BLOCK_LEN - 1) / BLOCK_LEN;
    if total_blocks == 0 {
        return Ok(Vec::new());
    }

    let mut first_block = vec![0u8; BLOCK_LEN];
    r.read_exact(&mut first_block)?;

    if first_block.len() >= 2 && first_block[0] == SQ_MAGIC_LE[0] && first_block[1] == SQ_MAGIC_LE[1] {
        let remaining_blocks = total_blocks - 1;
        let mut rest = vec![0u8; remaining_blocks * BLOCK_LEN];
        r.read_exact(&mut rest)?;
        let mut full = first_block;
        full.extend_from_slice(&rest);

        let mut cursor = std::io::Cursor::new(full);
        let mut out = Vec::new();
        sq::decode(&mut cursor, &mut out)?;
        Ok(out)
    } else {
        let remaining_blocks = total_blocks - 1;
        if remaining_blocks > 0 {
            discard(r, (remaining_blocks * BLOCK_LEN) as u64)?;
        }
        first_block.truncate(header.eof as usize);
        Ok(first_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_header(filename: &str, eof: u32, files_to_follow: u8) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_LEN];
        block[0] = 0x0A;
        block[1] = 0x47;
        block[2] = 0x4C;
        block[offset::ID_BYTE] = 0x02;
        block[offset::FILE_TYPE] = 0x04; // text
        block[offset::NAME_LEN] = filename.len() as u8;
        block[offset::NAME..offset::NAME + filename.len()].copy_from_slice(filename.as_bytes());
        let eof_bytes = eof.to_le_bytes();
        block[offset::EOF_LOW] = eof_bytes[0];
        block[offset::EOF_LOW + 1] = eof_bytes[1];
        block[offset::EOF_HIGH] = eof_bytes[2];
        block[offset::FILES_TO_FOLLOW] = files_to_follow;
        block
    }

    #[test]
    fn reads_single_uncompressed_entry() {
        let mut data = make_header("HELLO.TXT", 5, 0);
        let mut content = vec![0u8; BLOCK_LEN];
        content[..5].copy_from_slice(b"hello");
        data.extend_from_slice(&content);

        let mut cursor = Cursor::new(data);
        let entries = read_all(&mut cursor).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content.as_deref(), Some(&b"hello"[..]));
    }
}
