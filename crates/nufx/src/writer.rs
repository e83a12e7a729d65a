//! NuFX writer / updater (`spec.md` §4.G): serializes master/record/
//! thread headers and orchestrates the flush protocol (temp file,
//! per-thread encode, header backpatching, atomic rename-over-original).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bitflags::bitflags;
use tempfile::NamedTempFile;

use crate::byteio::{write_u16_le, write_u32_le, Crc16};
use crate::codec;
use crate::error::{Error, Result};
use crate::model::{MasterHeader, Record, Thread};
use crate::reader::{NUFILE_MAGIC, NUFX_MAGIC};

bitflags! {
    /// `spec.md` §4.G step 6: flush outcome flags, OR-ed together.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlushStatus: u8 {
        const SUCCEEDED   = 0b0000_0001;
        const ABORTED     = 0b0000_0010;
        const CORRUPTED   = 0b0000_0100;
        const READ_ONLY   = 0b0000_1000;
        const INACCESSIBLE = 0b0001_0000;
    }
}

pub fn write_new_archive_header<W: Write>(w: &mut W, total_records: u32) -> Result<()> {
    let header = MasterHeader {
        total_records,
        create_when: crate::datetime::TimeRec::NO_DATE,
        mod_when: crate::datetime::TimeRec::NO_DATE,
        master_version: MasterHeader::MAX_SUPPORTED_VERSION,
        master_eof: 0,
        is_valid: true,
    };
    write_master_header(w, &header)
}

pub fn write_master_header<W: Write>(w: &mut W, header: &MasterHeader) -> Result<()> {
    let mut buf = Vec::with_capacity(48);
    buf.extend_from_slice(&NUFILE_MAGIC);
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&header.total_records.to_le_bytes());
    header.create_when.write(&mut buf)?;
    header.mod_when.write(&mut buf)?;
    buf.extend_from_slice(&header.master_version.to_le_bytes());
    buf.extend_from_slice(&[0u8; 8]);
    buf.extend_from_slice(&header.master_eof.to_le_bytes());
    buf.extend_from_slice(&[0u8; 6]);

    let crc = Crc16::of(&buf);
    buf[6] = (crc & 0xff) as u8;
    buf[7] = (crc >> 8) as u8;
    w.write_all(&buf)?;
    Ok(())
}

/// Serializes one record header (fixed fields + options + pad + filename
/// + thread headers) with the header CRC computed over the whole thing,
/// and returns the byte length of what was written (needed by the
/// caller to seek back and patch per-thread fields after streaming each
/// thread's data).
fn write_record_header<W: Write>(w: &mut W, record: &Record) -> Result<usize> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&NUFX_MAGIC);
    buf.extend_from_slice(&[0, 0]); // header CRC placeholder

    let filename_bytes = record.inline_filename.as_deref().unwrap_or("").as_bytes();

    // attribCount covers everything up to (not including) filenameLength;
    // recomputed to match exactly what we emit, so no padding is needed
    // on our own round trip (`extra_bytes` from a foreign writer, if any,
    // is preserved verbatim after the option list).
    let mut fixed = Vec::new();
    fixed.extend_from_slice(&[0, 0]); // attribCount placeholder, patched below
    fixed.extend_from_slice(&record.version.to_le_bytes());
    fixed.extend_from_slice(&(record.threads.len() as u32).to_le_bytes());
    fixed.extend_from_slice(&record.file_sys_id.to_le_bytes());
    fixed.extend_from_slice(&record.file_sys_info.to_le_bytes());
    fixed.extend_from_slice(&record.attr.access.to_le_bytes());
    fixed.extend_from_slice(&record.attr.file_type.to_le_bytes());
    fixed.extend_from_slice(&record.attr.extra_type.to_le_bytes());
    fixed.extend_from_slice(&record.attr.storage_type.to_le_bytes());
    record.create_when.write(&mut fixed)?;
    record.mod_when.write(&mut fixed)?;
    record.archive_when.write(&mut fixed)?;
    if record.version >= 1 {
        fixed.extend_from_slice(&(record.option_list.len() as u16).to_le_bytes());
        fixed.extend_from_slice(&record.option_list);
    }
    fixed.extend_from_slice(&record.extra_bytes);

    let attrib_count = (fixed.len() - 2) as u16;
    fixed[0] = (attrib_count & 0xff) as u8;
    fixed[1] = (attrib_count >> 8) as u8;

    buf.extend_from_slice(&fixed);
    buf.extend_from_slice(&(filename_bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(filename_bytes);

    for thread in &record.threads {
        write_thread_header_into(&mut buf, thread);
    }

    let crc = {
        let mut for_crc = buf.clone();
        for_crc[4] = 0;
        for_crc[5] = 0;
        Crc16::of(&for_crc)
    };
    buf[4] = (crc & 0xff) as u8;
    buf[5] = (crc >> 8) as u8;

    let len = buf.len();
    w.write_all(&buf)?;
    Ok(len)
}

fn write_thread_header_into(buf: &mut Vec<u8>, thread: &Thread) {
    buf.extend_from_slice(&thread.id.class.to_le_bytes());
    let format_raw: u16 = thread.format.into();
    buf.extend_from_slice(&format_raw.to_le_bytes());
    buf.extend_from_slice(&thread.id.kind.to_le_bytes());
    buf.extend_from_slice(&thread.thread_crc.to_le_bytes());
    buf.extend_from_slice(&thread.thread_eof.to_le_bytes());
    buf.extend_from_slice(&thread.comp_thread_eof.to_le_bytes());
}

/// Byte offset of a thread header's CRC/EOF/compEOF trio within a
/// record header buffer that was produced by `write_record_header`:
/// fixed prefix, then 16 bytes per thread before this one.
fn thread_header_crc_offset(record: &Record, thread_pos: usize) -> u64 {
    let filename_len = record
        .inline_filename
        .as_deref()
        .map(|s| s.len())
        .unwrap_or(0);
    let fixed_len = {
        // magic(4) + crc(2) + attribCount(2) + version(2) + totalThreads(4)
        // + fileSysID(2) + fileSysInfo(2) + access(4) + fileType(4)
        // + extraType(4) + storageType(2) + 3*timerec(24)
        let mut n = 4 + 2 + 2 + 2 + 4 + 2 + 2 + 4 + 4 + 4 + 2 + 24;
        if record.version >= 1 {
            n += 2 + record.option_list.len();
        }
        n += record.extra_bytes.len();
        n + 2 + filename_len
    };
    (fixed_len + thread_pos * 16 + 6) as u64 // +6 skips class/format/kind to threadCRC
}

/// What to do for one thread while rewriting a record's data section.
pub enum ThreadPlan {
    /// Copy `comp_len` bytes verbatim starting at `file_offset` in the
    /// original archive (surviving, unmodified thread).
    CopyExisting { file_offset: u64, comp_len: u64 },
    /// Encode fresh bytes from a staged source.
    Encode {
        source: crate::source_sink::Source,
        declared_len: u64,
        max_len: Option<u32>,
    },
}

/// Write one record (header + thread data) into `temp`, patching the
/// thread headers and record-header CRC afterward via `Seek`. `original`
/// supplies bytes for `ThreadPlan::CopyExisting` entries.
pub fn write_record_to_temp<W: Write + Seek>(
    temp: &mut W,
    record: &mut Record,
    plans: Vec<ThreadPlan>,
    original: Option<&mut File>,
) -> Result<()> {
    let record_start = temp.stream_position()?;
    write_record_header(temp, record)?;
    let data_start = temp.stream_position()?;

    let mut original = original;

    for (idx, plan) in plans.into_iter().enumerate() {
        let thread_data_start = temp.stream_position()?;
        let (thread_eof, comp_thread_eof, thread_crc) = match plan {
            ThreadPlan::CopyExisting { file_offset, comp_len } => {
                let src = original.as_deref_mut().ok_or(Error::BadStruct("copy-existing thread with no source archive"))?;
                src.seek(SeekFrom::Start(file_offset))?;
                let mut remaining = comp_len;
                let mut buf = [0u8; 8192];
                let mut crc = Crc16::new();
                while remaining > 0 {
                    let want = remaining.min(buf.len() as u64) as usize;
                    src.read_exact(&mut buf[..want])?;
                    crc = Crc16::update(crc, &buf[..want]);
                    temp.write_all(&buf[..want])?;
                    remaining -= want as u64;
                }
                let _ = crc;
                let eof = record.threads[idx].thread_eof;
                (eof, comp_len as u32, record.threads[idx].thread_crc)
            }
            ThreadPlan::Encode {
                mut source,
                declared_len,
                max_len,
            } => {
                let format = record.threads[idx].format;
                let (_, result) = codec::encode(format, &mut source, temp, declared_len)?;
                if let Some(max) = max_len {
                    if result.compressed_len > max as u64 || declared_len > max as u64 {
                        return Err(Error::PreSizeOverflow);
                    }
                    let pad = max as u64 - result.compressed_len;
                    if pad > 0 {
                        temp.write_all(&vec![0u8; pad as usize])?;
                    }
                    (declared_len as u32, max, result.crc)
                } else {
                    (declared_len as u32, result.compressed_len as u32, result.crc)
                }
            }
        };

        record.threads[idx].thread_eof = thread_eof;
        record.threads[idx].comp_thread_eof = comp_thread_eof;
        record.threads[idx].thread_crc = thread_crc;
        record.threads[idx].file_offset = Some(thread_data_start);
    }

    let data_end = temp.stream_position()?;

    // Patch per-thread CRC/EOF/compEOF fields.
    for (idx, thread) in record.threads.iter().enumerate() {
        let offset = record_start + thread_header_crc_offset(record, idx);
        temp.seek(SeekFrom::Start(offset))?;
        write_u16_le(temp, thread.thread_crc)?;
        write_u32_le(temp, thread.thread_eof)?;
        write_u32_le(temp, thread.comp_thread_eof)?;
    }

    // Recompute the record header CRC now that thread fields are patched.
    temp.seek(SeekFrom::Start(record_start))?;
    let mut full = vec![0u8; (data_start - record_start) as usize];
    temp.read_exact(&mut full)?;
    full[4] = 0;
    full[5] = 0;
    let crc = Crc16::of(&full);
    temp.seek(SeekFrom::Start(record_start + 4))?;
    write_u16_le(temp, crc)?;

    temp.seek(SeekFrom::Start(data_end))?;
    record.file_offset = Some(record_start);
    Ok(())
}

/// Atomically replace `original_path` with `temp`'s contents.
pub fn commit(temp: NamedTempFile, original_path: &Path) -> Result<()> {
    temp.persist(original_path)
        .map_err(|_| Error::FlushInaccessible)?;
    Ok(())
}

/// Discard a temp file without touching the original (`spec.md` §4.G
/// "Abort").
pub fn abort(temp: NamedTempFile) {
    drop(temp);
}

pub fn new_temp_file_near(original_path: &Path) -> Result<NamedTempFile> {
    let dir = original_path.parent().unwrap_or_else(|| Path::new("."));
    tempfile::Builder::new()
        .prefix(".nufx-")
        .tempfile_in(dir)
        .map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordAttr, RecordIdx};
    use crate::reader;
    use std::io::Cursor;

    #[test]
    fn master_header_roundtrips_crc() {
        let mut buf = Vec::new();
        write_new_archive_header(&mut buf, 3).unwrap();
        assert_eq!(buf.len(), 48);
        let mut cursor = Cursor::new(buf);
        let outcome = reader::read_archive_header_only(&mut cursor).unwrap();
        assert_eq!(outcome.total_records, 3);
    }

    #[test]
    fn record_header_roundtrips() {
        let attr = RecordAttr {
            access: 0xC3,
            file_type: 0x04,
            extra_type: 0,
            storage_type: 1,
        };
        let mut record = Record::new(RecordIdx(0), attr);
        record.inline_filename = Some("HELLO".into());

        let mut buf = Vec::new();
        write_record_header(&mut buf, &record).unwrap();
        assert!(!buf.is_empty());
    }
}
