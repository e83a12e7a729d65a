//! Public façade (`spec.md` §4.J, §5): opens/closes archives, exposes
//! records and threads, dispatches mutation primitives, and owns the
//! single-threaded busy-flag reentrancy guard.
//!
//! Grounded in `NuArchive`/`NuOpenRW`/`NuFlush`/`NuClose`
//! (`original_source/nufxlib-0/NufxLib.h`); callback dispatch is
//! simplified to plain function pointers rather than the source's
//! function-pointer-table-plus-void-star-context (`spec.md` §9 "Callback
//! returns as outcomes" — modeled here as a closed enum checked at the
//! call site, same spirit, narrower surface).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::codec::{self, ThreadFormat};
use crate::config::{Config, HandleExisting};
use crate::datetime::TimeRec;
use crate::error::{Error, Result};
use crate::model::{
    thread_class, thread_kind, EffectiveName, Record, RecordAttr, RecordIdx, Thread, ThreadId, ThreadIdx, ThreadMod,
    COMMENT_THREAD, DEFAULT_COMMENT_RESERVE, DEFAULT_FILENAME_RESERVE, FILENAME_THREAD, OLD_COMMENT_THREAD,
};
use crate::reader::{self, ReadPolicy};
use crate::source_sink::{EolConvert, Sink, Source};
use crate::wrapper::{self, Wrapper};
use crate::writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    StreamRead,
    FileRead,
    FileReadWrite,
}

/// Legal outcomes a callback may return (`spec.md` §4.J, §9 "Callback
/// returns as outcomes" — modeled per-site below rather than one giant
/// shared enum).
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    Ok,
    Skip,
    Abort,
    Retry,
    Ignore,
    Rename(String),
    Overwrite,
}

pub struct Callbacks {
    pub selection_filter: Option<fn(&Record) -> CallbackOutcome>,
    pub output_pathname_filter: Option<fn(&Record, &str) -> CallbackOutcome>,
    pub progress_updater: Option<fn(RecordIdx, u64, u64)>,
    pub error_handler: Option<fn(&Error) -> CallbackOutcome>,
    pub error_message_handler: Option<fn(&str)>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Callbacks {
            selection_filter: None,
            output_pathname_filter: None,
            progress_updater: None,
            error_handler: None,
            error_message_handler: None,
        }
    }
}

/// Scoped reentrancy guard (`spec.md` §5, §9 "Busy flag -> transaction
/// guard"): every top-level entry point holds one for its duration; an
/// entry called while another is already in flight observes `busy` set
/// and fails with `Error::Busy` before ever constructing the guard.
struct BusyGuard<'a> {
    flag: &'a mut bool,
}

impl<'a> Drop for BusyGuard<'a> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

pub struct Archive {
    mode: OpenMode,
    path: Option<PathBuf>,
    /// Random-access handle to the archive as last committed to disk;
    /// `None` for a brand new archive that has never been flushed.
    file: Option<File>,
    /// Byte offset within `file` where the NuFile magic begins, i.e. the
    /// length of whatever wrapper (`wrapper::Wrapper`) precedes it.
    data_start: u64,
    master: crate::model::MasterHeader,
    records: Vec<Record>,
    next_record_idx: u32,
    config: Config,
    extra_data: Option<Box<dyn std::any::Any>>,
    busy: bool,
    pub callbacks: Callbacks,
}

impl Archive {
    pub fn create_new(path: impl AsRef<Path>) -> Self {
        Archive {
            mode: OpenMode::FileReadWrite,
            path: Some(path.as_ref().to_path_buf()),
            file: None,
            data_start: 0,
            master: crate::model::MasterHeader::new(),
            records: Vec::new(),
            next_record_idx: 0,
            config: Config::default(),
            extra_data: None,
            busy: false,
            callbacks: Callbacks::default(),
        }
    }

    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, false)
    }

    pub fn open_read_write(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, true)
    }

    fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let mut prefix = vec![0u8; wrapper::BNY_BLOCK_LEN + reader::NUFILE_MAGIC.len()];
        let n = file.read(&mut prefix)?;
        prefix.truncate(n);
        let w = wrapper::detect(&prefix);
        if matches!(w, Wrapper::BinaryTwo) {
            return Err(Error::IsBinary2);
        }

        file.seek(SeekFrom::Start(0))?;
        wrapper::skip_wrapper(&mut file, w)?;
        let data_start = file.stream_position()?;

        let config = Config::default();
        let policy = ReadPolicy {
            ignore_crc: config.ignore_crc(),
        };
        let outcome = reader::read_archive(&mut file, policy)?;
        let next_record_idx = outcome.records.len() as u32;

        Ok(Archive {
            mode: if writable { OpenMode::FileReadWrite } else { OpenMode::FileRead },
            path: Some(path),
            file: Some(file),
            data_start,
            master: outcome.master,
            records: outcome.records,
            next_record_idx,
            config,
            extra_data: None,
            busy: false,
            callbacks: Callbacks::default(),
        })
    }

    fn enter(&mut self) -> Result<BusyGuard<'_>> {
        if self.busy {
            return Err(Error::Busy);
        }
        self.busy = true;
        Ok(BusyGuard { flag: &mut self.busy })
    }

    // -- inspection (bypass the busy flag per spec.md §5) --

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, idx: RecordIdx) -> Option<&Record> {
        self.records.iter().find(|r| r.record_idx == idx)
    }

    /// Looks up a record by its effective name (`spec.md` §3: a
    /// filename-class thread overrides the inline name). Records with no
    /// filename thread are matched against `inline_filename` without any
    /// I/O; records that do carry one are resolved by decoding that
    /// thread's bytes, hence `&mut self` rather than a plain accessor.
    pub fn record_by_name(&mut self, name: &str) -> Result<Option<RecordIdx>> {
        let candidates: Vec<RecordIdx> = self.records.iter().map(|r| r.record_idx).collect();
        for idx in candidates {
            if self.effective_name(idx)?.as_deref() == Some(name) {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    /// Resolves a record's effective name (`spec.md` §3, §4.E): the
    /// filename thread's decoded bytes when present, else the inline
    /// name from the record header, else `None`.
    pub fn effective_name(&mut self, idx: RecordIdx) -> Result<Option<String>> {
        let record = self.record(idx).ok_or(Error::RecIdxNotFound(idx))?;
        match record.effective_name_source() {
            EffectiveName::FilenameThread => {
                let bytes = self.extract_thread(idx, FILENAME_THREAD)?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            EffectiveName::Inline => Ok(self.record(idx).and_then(|r| r.inline_filename.clone())),
            EffectiveName::None => Ok(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Mirrors `NuTestFeature`/`NuFeature` (`spec.md` §9 "Supplemented
    /// features"): lets a caller check whether a compression format is
    /// usable before staging an `add_thread`/`add_file` with it.
    pub fn test_feature(&self, format: ThreadFormat) -> Result<()> {
        if crate::supports_format(format) {
            Ok(())
        } else {
            Err(Error::UnsupportedFeature)
        }
    }

    /// Partial update of a record's attribute fields, distinct from its
    /// thread array (`NuRecordAttr` in `NufxLib.h`; `spec.md` §9
    /// "Supplemented features"). Marks the record dirty so the header is
    /// rewritten at the next flush even if no thread changed.
    pub fn set_record_attr(&mut self, idx: RecordIdx, attr: RecordAttr) -> Result<()> {
        let record = self.record_mut(idx)?;
        record.attr = attr;
        record.dirty_header = true;
        Ok(())
    }

    /// Mirrors `NuDebugDumpArchive`: emits the full TOC at `tracing::debug!`
    /// for diagnostic use (`spec.md` §9 "Supplemented features"). Never
    /// fires under a release build's default `info`-level filter.
    pub fn debug_dump(&self) {
        tracing::debug!(total_records = self.records.len(), "archive TOC dump");
        for record in &self.records {
            tracing::debug!(
                record = record.record_idx.0,
                name = ?record.inline_filename,
                threads = record.threads.len(),
                "record"
            );
        }
    }

    pub fn extra_data(&self) -> Option<&(dyn std::any::Any)> {
        self.extra_data.as_deref()
    }

    pub fn set_extra_data(&mut self, data: Box<dyn std::any::Any>) {
        self.extra_data = Some(data);
    }

    // -- record/thread mutation (journaled, applied at flush) --

    pub fn add_record(&mut self, attr: RecordAttr) -> RecordIdx {
        let idx = RecordIdx(self.next_record_idx);
        self.next_record_idx += 1;
        let mut record = Record::new(idx, attr);
        record.dirty_header = true;
        self.records.push(record);
        idx
    }

    pub fn mark_delete_record(&mut self, idx: RecordIdx) -> Result<()> {
        let record = self.record_mut(idx)?;
        record.marked_for_deletion = true;
        Ok(())
    }

    /// Convenience matching the CLI's common "add a data fork with this
    /// filename" case: stages a filename thread plus one data thread.
    pub fn add_file(
        &mut self,
        attr: RecordAttr,
        filename: &str,
        data: Vec<u8>,
        format: ThreadFormat,
    ) -> Result<RecordIdx> {
        let idx = self.add_record(attr);
        self.add_thread(
            idx,
            FILENAME_THREAD,
            ThreadFormat::Uncompressed,
            Source::from_buffer(filename.as_bytes().to_vec(), ThreadFormat::Uncompressed),
        )?;
        self.add_thread(
            idx,
            ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK),
            format,
            Source::from_buffer(data, format),
        )?;
        Ok(idx)
    }

    /// `add_file`, but honoring the archive's duplicate-name policy
    /// (`spec.md` §4.G "Only-update-older" / "Must-overwrite"): resolves
    /// any existing record sharing `filename`'s effective name, applies
    /// `OnlyUpdateOlder` and `HandleExisting`, and supersedes the stale
    /// record (marking it for deletion) when this add replaces it.
    pub fn add_file_checked(
        &mut self,
        attr: RecordAttr,
        filename: &str,
        data: Vec<u8>,
        format: ThreadFormat,
        mod_when: TimeRec,
    ) -> Result<RecordIdx> {
        let existing = self.record_by_name(filename)?;

        if self.config.handle_existing() == HandleExisting::MustOverwrite && existing.is_none() {
            return Err(Error::DuplicateNotFound);
        }

        if let Some(existing_idx) = existing {
            if self.config.only_update_older() {
                if let Some(existing_mod) = self.record(existing_idx).map(|r| r.mod_when) {
                    let is_newer = match (mod_when.to_unix_timestamp(), existing_mod.to_unix_timestamp()) {
                        (Some(new), Some(old)) => new > old,
                        _ => true,
                    };
                    if !is_newer {
                        return Err(Error::NotNewer);
                    }
                }
            }
            if self.config.handle_existing() == HandleExisting::NeverOverwrite {
                return Err(Error::RecordExists);
            }
            self.mark_delete_record(existing_idx)?;
        }

        let idx = self.add_file(attr, filename, data, format)?;
        if let Some(record) = self.records.iter_mut().find(|r| r.record_idx == idx) {
            record.mod_when = mod_when;
            record.create_when = mod_when;
        }
        Ok(idx)
    }

    pub fn add_thread(&mut self, record_idx: RecordIdx, id: ThreadId, format: ThreadFormat, source: Source) -> Result<()> {
        let record = self.record_mut(record_idx)?;
        if record.marked_for_deletion {
            return Err(Error::ModRecChange);
        }
        if record.is_presized_id(id) && record.find_thread(id).is_some() {
            return Err(Error::ThreadAdd);
        }
        record.pending_mods.push(ThreadMod::Add { id, format, source });
        Ok(())
    }

    pub fn update_presized_thread(&mut self, record_idx: RecordIdx, thread_idx: ThreadIdx, source: Source, max_len: u32) -> Result<()> {
        let record = self.record_mut(record_idx)?;
        let thread = record.thread_by_idx(thread_idx).ok_or(Error::ThreadIdxNotFound(thread_idx))?;
        if !thread.is_presized() {
            return Err(Error::NotPreSized);
        }
        if record.pending_mods.iter().any(|m| m.target_thread() == Some(thread_idx)) {
            return Err(Error::ModThreadChange);
        }
        record.pending_mods.push(ThreadMod::UpdatePresized { thread_idx, source, max_len });
        Ok(())
    }

    pub fn delete_thread(&mut self, record_idx: RecordIdx, thread_idx: ThreadIdx) -> Result<()> {
        let record = self.record_mut(record_idx)?;
        if record.pending_mods.iter().any(|m| m.target_thread() == Some(thread_idx)) {
            return Err(Error::ModThreadChange);
        }
        record.pending_mods.push(ThreadMod::Delete { thread_idx });
        Ok(())
    }

    fn record_mut(&mut self, idx: RecordIdx) -> Result<&mut Record> {
        self.records
            .iter_mut()
            .find(|r| r.record_idx == idx)
            .ok_or(Error::RecIdxNotFound(idx))
    }

    /// Discards every staged (not-yet-flushed) modification. Since this
    /// crate's `flush` only ever touches disk once it has assembled the
    /// full target layout in memory (`spec.md` §4.G), calling this
    /// instead of `flush` after staging changes satisfies scenario E4:
    /// the archive file and its modification time are left untouched.
    pub fn abort(&mut self) {
        for record in &mut self.records {
            record.pending_mods.clear();
            record.dirty_header = false;
            record.marked_for_deletion = false;
        }
        self.records.retain(|r| r.file_offset.is_some());
    }

    fn is_dirty(&self) -> bool {
        self.records.iter().any(|r| r.is_dirty() || r.marked_for_deletion || r.file_offset.is_none())
    }

    // -- flush --

    pub fn flush(&mut self) -> Result<writer::FlushStatus> {
        let _guard = self.enter()?;

        if !self.is_dirty() {
            return Ok(writer::FlushStatus::SUCCEEDED);
        }

        let all_deleted = self.records.iter().all(|r| r.marked_for_deletion) && !self.records.is_empty();
        if all_deleted && !self.config.allow_duplicates() {
            return Err(Error::AllDeleted);
        }

        let path = self
            .path
            .clone()
            .ok_or(Error::InvalidArg("archive has no backing path to flush to"))?;

        let mut temp = writer::new_temp_file_near(&path)?;
        writer::write_master_header(temp.as_file_mut(), &self.master)?;

        let data_start = self.data_start;
        let mut original = self.file.take();

        for record in self.records.iter_mut() {
            if record.marked_for_deletion {
                continue;
            }
            let plans = apply_pending_mods(record, data_start)?;
            writer::write_record_to_temp(temp.as_file_mut(), record, plans, original.as_mut())?;
        }

        self.records.retain(|r| !r.marked_for_deletion);
        self.master.total_records = self.records.len() as u32;
        let eof = temp.as_file_mut().stream_position()?;
        self.master.master_eof = eof as u32;

        temp.as_file_mut().seek(SeekFrom::Start(0))?;
        writer::write_master_header(temp.as_file_mut(), &self.master)?;

        writer::commit(temp, &path)?;

        for record in self.records.iter_mut() {
            record.dirty_header = false;
        }

        let mut reopened = File::open(&path)?;
        reopened.seek(SeekFrom::Start(0))?;
        self.file = Some(reopened);
        self.data_start = 0;

        Ok(writer::FlushStatus::SUCCEEDED)
    }

    // -- extraction --

    pub fn extract_thread(&mut self, record_idx: RecordIdx, id: ThreadId) -> Result<Vec<u8>> {
        let _guard = self.enter()?;
        let data_start = self.data_start;
        let record = self.records.iter().find(|r| r.record_idx == record_idx).ok_or(Error::RecIdxNotFound(record_idx))?;
        let thread = record.find_thread(id).ok_or(Error::ThreadIDNotFound)?;
        let offset = thread.file_offset.ok_or(Error::BadStruct("thread has no file offset; flush before extracting"))?;
        let comp_len = thread.comp_thread_eof as u64;
        let expected_len = thread.thread_eof as u64;
        let format = thread.format;

        let file = self.file.as_mut().ok_or(Error::InvalidArg("archive has no backing file"))?;
        file.seek(SeekFrom::Start(data_start + offset))?;

        let mut out = Vec::new();
        let crc_result = codec::decode(format, file, &mut out, comp_len, expected_len);
        let out = match crc_result {
            Ok(_) => out,
            Err(e) if e.is_crc_error() && self.config.ignore_crc() => out,
            Err(e) => return Err(e),
        };

        // Per spec.md §4.C, EOL conversion only touches the data fork —
        // filenames, comments and resource forks pass through untouched.
        let eol_convert = self.config.convert_extracted_eol();
        if eol_convert == EolConvert::Off || id != ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK) {
            return Ok(out);
        }

        let cap = (out.len() * 2).max(64);
        let mut sink = Sink::to_buffer(cap, false, eol_convert, self.config.eol());
        sink.write(&out)?;
        sink.finish()?;
        Ok(sink.into_buffer().expect("buffer sink always yields a buffer"))
    }
}

trait RecordExt {
    fn is_presized_id(&self, id: ThreadId) -> bool;
}

impl RecordExt for Record {
    fn is_presized_id(&self, id: ThreadId) -> bool {
        id == FILENAME_THREAD || id == COMMENT_THREAD || id == OLD_COMMENT_THREAD
    }
}

fn default_reserve(id: ThreadId) -> u32 {
    if id == FILENAME_THREAD {
        DEFAULT_FILENAME_RESERVE
    } else {
        DEFAULT_COMMENT_RESERVE
    }
}

fn apply_pending_mods(record: &mut Record, data_start: u64) -> Result<Vec<writer::ThreadPlan>> {
    use std::collections::{HashMap, HashSet};

    let mods = std::mem::take(&mut record.pending_mods);
    let mut deletes: HashSet<ThreadIdx> = HashSet::new();
    let mut updates: HashMap<ThreadIdx, (Source, u32)> = HashMap::new();
    let mut adds: Vec<(ThreadId, ThreadFormat, Source)> = Vec::new();

    for m in mods {
        match m {
            ThreadMod::Delete { thread_idx } => {
                deletes.insert(thread_idx);
            }
            ThreadMod::UpdatePresized { thread_idx, source, max_len } => {
                updates.insert(thread_idx, (source, max_len));
            }
            ThreadMod::Add { id, format, source } => adds.push((id, format, source)),
        }
    }

    let mut plans = Vec::new();
    let mut kept_threads = Vec::new();

    for thread in record.threads.drain(..) {
        if deletes.contains(&thread.thread_idx) {
            continue;
        }
        if let Some((source, max_len)) = updates.remove(&thread.thread_idx) {
            let declared_len = source.info.other_len;
            plans.push(writer::ThreadPlan::Encode {
                source,
                declared_len,
                max_len: Some(max_len),
            });
            kept_threads.push(thread);
        } else {
            let file_offset = thread
                .file_offset
                .ok_or(Error::BadStruct("surviving thread missing file offset"))?;
            plans.push(writer::ThreadPlan::CopyExisting {
                file_offset: data_start + file_offset,
                comp_len: thread.comp_thread_eof as u64,
            });
            kept_threads.push(thread);
        }
    }

    for (id, format, source) in adds {
        let idx = record.alloc_thread_idx();
        let declared_len = source.info.other_len;
        let is_presized = id == FILENAME_THREAD || id == COMMENT_THREAD || id == OLD_COMMENT_THREAD;
        let max_len = if is_presized {
            Some(declared_len.max(default_reserve(id) as u64) as u32)
        } else {
            None
        };
        kept_threads.push(Thread::new(idx, id, format));
        plans.push(writer::ThreadPlan::Encode {
            source,
            declared_len,
            max_len,
        });
    }

    record.threads = kept_threads;
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{thread_class, thread_kind};

    fn tmp_archive_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nufx-archive-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn create_add_flush_extract_roundtrip() {
        let path = tmp_archive_path("e1");
        let _ = std::fs::remove_file(&path);

        let mut archive = Archive::create_new(&path);
        let attr = RecordAttr {
            access: 0xc3,
            file_type: 0x04,
            extra_type: 0,
            storage_type: 1,
        };
        let idx = archive
            .add_file(attr, "HELLO", b"Hello, NuFX".to_vec(), ThreadFormat::Uncompressed)
            .unwrap();
        archive.flush().unwrap();
        assert_eq!(archive.master.total_records, 1);

        let bytes = archive
            .extract_thread(idx, ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK))
            .unwrap();
        assert_eq!(bytes, b"Hello, NuFX");

        let mut reopened = Archive::open_read_only(&path).unwrap();
        assert_eq!(reopened.records().len(), 1);
        let idx2 = reopened.records()[0].record_idx;
        let bytes2 = reopened
            .extract_thread(idx2, ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK))
            .unwrap();
        assert_eq!(bytes2, b"Hello, NuFX");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn abort_leaves_archive_untouched() {
        let path = tmp_archive_path("e4");
        let _ = std::fs::remove_file(&path);

        let mut archive = Archive::create_new(&path);
        let attr = RecordAttr {
            access: 0,
            file_type: 0,
            extra_type: 0,
            storage_type: 1,
        };
        archive.add_record(attr);
        assert!(!path.exists());
        archive.abort();
        assert!(!path.exists());
        assert!(archive.records().is_empty());
    }

    #[test]
    fn busy_flag_rejects_reentry() {
        let path = tmp_archive_path("busy");
        let _ = std::fs::remove_file(&path);
        let mut archive = Archive::create_new(&path);
        let _guard = archive.enter().unwrap();
        assert!(matches!(archive.enter().unwrap_err(), Error::Busy));
    }

    #[test]
    fn only_update_older_rejects_non_newer_duplicate() {
        let path = tmp_archive_path("only-update-older");
        let _ = std::fs::remove_file(&path);
        let attr = RecordAttr {
            access: 0xc3,
            file_type: 0x04,
            extra_type: 0,
            storage_type: 1,
        };

        let mut archive = Archive::create_new(&path);
        let older = TimeRec::from_unix_timestamp(800_000_000);
        archive
            .add_file_checked(attr, "DUP", b"first".to_vec(), ThreadFormat::Uncompressed, older)
            .unwrap();
        archive.flush().unwrap();

        archive.config_mut().set_only_update_older(true).unwrap();
        let same_time_err = archive
            .add_file_checked(attr, "DUP", b"second".to_vec(), ThreadFormat::Uncompressed, older)
            .unwrap_err();
        assert!(matches!(same_time_err, Error::NotNewer));

        let newer = TimeRec::from_unix_timestamp(900_000_000);
        archive
            .add_file_checked(attr, "DUP", b"second".to_vec(), ThreadFormat::Uncompressed, newer)
            .unwrap();

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn must_overwrite_requires_existing_duplicate() {
        let path = tmp_archive_path("must-overwrite");
        let _ = std::fs::remove_file(&path);
        let attr = RecordAttr {
            access: 0,
            file_type: 0,
            extra_type: 0,
            storage_type: 1,
        };

        let mut archive = Archive::create_new(&path);
        archive.config_mut().set_handle_existing(HandleExisting::MustOverwrite).unwrap();
        let err = archive
            .add_file_checked(attr, "NOPE", b"data".to_vec(), ThreadFormat::Uncompressed, TimeRec::NO_DATE)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateNotFound));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn extract_thread_applies_eol_conversion_to_data_fork_only() {
        use crate::source_sink::{Eol, EolConvert};

        let path = tmp_archive_path("eol-convert");
        let _ = std::fs::remove_file(&path);

        let attr = RecordAttr {
            access: 0xc3,
            file_type: 0x04,
            extra_type: 0,
            storage_type: 1,
        };
        let mut archive = Archive::create_new(&path);
        let idx = archive
            .add_file(attr, "CRLF.TXT", b"a\r\nb\r\nc".to_vec(), ThreadFormat::Uncompressed)
            .unwrap();
        archive.flush().unwrap();

        archive.config_mut().set_convert_extracted_eol(EolConvert::On).unwrap();
        archive.config_mut().set_eol(Eol::Lf).unwrap();

        let data = archive
            .extract_thread(idx, ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK))
            .unwrap();
        assert_eq!(data, b"a\nb\nc");

        // The filename thread is untouched by the conversion even though
        // it shares the extraction path.
        let name = archive.effective_name(idx).unwrap();
        assert_eq!(name, Some("CRLF.TXT".to_string()));

        let _ = std::fs::remove_file(&path);
    }
}
