//! NuFX reader (`spec.md` §4.F, §6).
//!
//! Parses the master header, then each record header and its thread
//! headers, validating CRCs and building the TOC. Works over any `Read`
//! — no `Seek` bound — so the same code path serves both streaming
//! (pipe) and random-access archives (`spec.md` §9 "Streaming vs
//! random-access"): thread data that isn't being extracted right now is
//! skipped with `ForwardSeek::skip`, which degrades to read-and-discard
//! on a pure stream.

use std::io::Read;

use crate::byteio::{discard, read_bytes, read_u16_le, read_u32_le, Crc16};
use crate::codec::ThreadFormat;
use crate::datetime::TimeRec;
use crate::error::{Error, Result};
use crate::model::{MasterHeader, Record, RecordAttr, RecordIdx, Thread, ThreadId, ThreadIdx};

pub const NUFILE_MAGIC: [u8; 6] = [0x4E, 0xF5, 0x46, 0xE9, 0x6C, 0xE5];
pub const NUFX_MAGIC: [u8; 4] = [0x4E, 0xF5, 0x46, 0xD8];

const MASTER_HEADER_LEN: usize = 48;

/// Policy the reader consults for recoverable format errors, mirroring
/// the error-handler callback's "Ignore" outcome (`spec.md` §7).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadPolicy {
    pub ignore_crc: bool,
}

/// Tees every byte read through it into a side buffer, so a header's CRC
/// can be recomputed after the fact with the stored field patched to
/// zero — without knowing the header's total length up front.
struct TeeReader<'a, R> {
    inner: &'a mut R,
    captured: Vec<u8>,
}

impl<'a, R: Read> TeeReader<'a, R> {
    fn new(inner: &'a mut R) -> Self {
        TeeReader {
            inner,
            captured: Vec::new(),
        }
    }
}

impl<'a, R: Read> Read for TeeReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.captured.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

pub struct ReadOutcome {
    pub master: MasterHeader,
    pub records: Vec<Record>,
}

/// Parse a whole archive's master header and TOC. Assumes any wrapper
/// (BNY/SEA) has already been stripped by `wrapper.rs` and `r` is
/// positioned at the start of the NuFile magic.
pub fn read_archive<R: Read>(r: &mut R, policy: ReadPolicy) -> Result<ReadOutcome> {
    let mut pos: u64 = 0;
    let master = read_master_header(r, &mut pos, policy)?;

    if master.master_version > MasterHeader::MAX_SUPPORTED_VERSION {
        return Err(Error::BadMHVersion(master.master_version));
    }

    let mut records = Vec::with_capacity(master.total_records as usize);
    for i in 0..master.total_records {
        let record = read_record(r, &mut pos, RecordIdx(i), policy)?;
        records.push(record);
    }

    Ok(ReadOutcome { master, records })
}

/// Parse just the master header, for callers (and tests) that only need
/// the archive-level summary without walking every record.
pub fn read_archive_header_only<R: Read>(r: &mut R) -> Result<MasterHeader> {
    let mut pos = 0u64;
    read_master_header(r, &mut pos, ReadPolicy::default())
}

fn read_master_header<R: Read>(r: &mut R, pos: &mut u64, policy: ReadPolicy) -> Result<MasterHeader> {
    let mut tee = TeeReader::new(r);

    let magic = read_bytes(&mut tee, 6)?;
    if magic != NUFILE_MAGIC {
        return Err(Error::NotNuFX);
    }
    let stored_crc = read_u16_le(&mut tee)?;
    let total_records = read_u32_le(&mut tee)?;
    let create_when = TimeRec::read(&mut tee)?;
    let mod_when = TimeRec::read(&mut tee)?;
    let master_version = read_u16_le(&mut tee)?;
    let _reserved1 = read_bytes(&mut tee, 8)?;
    let master_eof = read_u32_le(&mut tee)?;
    let _reserved2 = read_bytes(&mut tee, 6)?;

    *pos += tee.captured.len() as u64;
    debug_assert_eq!(tee.captured.len(), MASTER_HEADER_LEN);

    let mut for_crc = tee.captured;
    for_crc[6] = 0;
    for_crc[7] = 0;
    let computed_crc = Crc16::of(&for_crc);

    let is_valid = computed_crc == stored_crc;
    if !is_valid {
        tracing::warn!(stored_crc, computed_crc, "master header CRC mismatch");
        if !policy.ignore_crc {
            return Err(Error::BadMHCRC);
        }
    }

    Ok(MasterHeader {
        total_records,
        create_when,
        mod_when,
        master_version,
        master_eof,
        is_valid,
    })
}

fn read_record<R: Read>(r: &mut R, pos: &mut u64, record_idx: RecordIdx, policy: ReadPolicy) -> Result<Record> {
    let mut tee = TeeReader::new(r);

    let magic = read_bytes(&mut tee, 4)?;
    if magic != NUFX_MAGIC {
        return Err(Error::RecHdrNotFound);
    }
    let stored_crc = read_u16_le(&mut tee)?;
    let attrib_count = read_u16_le(&mut tee)?;
    let version = read_u16_le(&mut tee)?;
    if version > 3 {
        return Err(Error::BadRecordVersion(version));
    }
    let total_threads = read_u32_le(&mut tee)?;
    let file_sys_id = read_u16_le(&mut tee)?;
    let file_sys_info = read_u16_le(&mut tee)?;
    let access = read_u32_le(&mut tee)?;
    let file_type = read_u32_le(&mut tee)?;
    let extra_type = read_u32_le(&mut tee)?;
    let storage_type = read_u16_le(&mut tee)?;
    let create_when = TimeRec::read(&mut tee)?;
    let mod_when = TimeRec::read(&mut tee)?;
    let archive_when = TimeRec::read(&mut tee)?;

    let option_list = if version >= 1 {
        let option_size = read_u16_le(&mut tee)?;
        read_bytes(&mut tee, option_size as usize)?
    } else {
        Vec::new()
    };

    // `attribCount` bounds the fixed+optional header area preceding the
    // filename length field; pad forward if our fixed-field reader
    // consumed less than that (older/foreign writers sometimes reserve
    // extra opaque bytes here).
    let consumed_before_name = tee.captured.len() as u16;
    let mut extra_bytes = Vec::new();
    if attrib_count > consumed_before_name {
        extra_bytes = read_bytes(&mut tee, (attrib_count - consumed_before_name) as usize)?;
    }

    let filename_len = read_u16_le(&mut tee)?;
    let inline_filename = if filename_len > 0 {
        let raw = read_bytes(&mut tee, filename_len as usize)?;
        Some(String::from_utf8_lossy(&raw).into_owned())
    } else {
        None
    };

    let mut threads = Vec::with_capacity(total_threads as usize);
    for i in 0..total_threads {
        let class = read_u16_le(&mut tee)?;
        let format_raw = read_u16_le(&mut tee)?;
        let kind = read_u16_le(&mut tee)?;
        let thread_crc = read_u16_le(&mut tee)?;
        let thread_eof = read_u32_le(&mut tee)?;
        let comp_thread_eof = read_u32_le(&mut tee)?;

        let format = ThreadFormat::from_u16(format_raw)?;
        let mut thread = Thread::new(ThreadIdx(i), ThreadId::new(class, kind), format);
        thread.thread_crc = thread_crc;
        thread.thread_eof = thread_eof;
        thread.comp_thread_eof = comp_thread_eof;
        thread.actual_eof = thread_eof;
        threads.push(thread);
    }

    let header_len = tee.captured.len();
    let mut for_crc = tee.captured;
    for_crc[4] = 0;
    for_crc[5] = 0;
    let computed_crc = Crc16::of(&for_crc);

    if computed_crc != stored_crc {
        tracing::warn!(record = record_idx.0, stored_crc, computed_crc, "record header CRC mismatch");
        if !policy.ignore_crc {
            return Err(Error::BadRHCRC(record_idx));
        }
    }

    let record_offset = *pos;
    *pos += header_len as u64;

    let attr = RecordAttr {
        access,
        file_type,
        extra_type,
        storage_type,
    };

    let mut record = Record::new(record_idx, attr);
    record.version = version;
    record.file_sys_id = file_sys_id;
    record.file_sys_info = file_sys_info;
    record.create_when = create_when;
    record.mod_when = mod_when;
    record.archive_when = archive_when;
    record.option_list = option_list;
    record.extra_bytes = extra_bytes;
    record.inline_filename = inline_filename;
    record.file_offset = Some(record_offset);

    for mut thread in threads {
        thread.file_offset = Some(*pos);
        let data_len = thread.comp_thread_eof as u64;
        *pos += data_len;
        discard(r, data_len)?;
        record.threads.push(thread);
    }
    // next_thread_idx must continue past whatever indices the reader
    // assigned, so later `add_thread` calls on this record don't collide.
    for _ in 0..total_threads {
        record.alloc_thread_idx();
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;
    use std::io::Cursor;

    #[test]
    fn rejects_bad_magic() {
        let data = vec![0u8; 48];
        let mut cursor = Cursor::new(data);
        let err = read_archive(&mut cursor, ReadPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::NotNuFX));
    }

    #[test]
    fn roundtrips_empty_archive_header() {
        let mut buf = Vec::new();
        writer::write_new_archive_header(&mut buf, 0).unwrap();
        let mut cursor = Cursor::new(buf);
        let outcome = read_archive(&mut cursor, ReadPolicy::default()).unwrap();
        assert_eq!(outcome.master.total_records, 0);
        assert!(outcome.records.is_empty());
    }
}
