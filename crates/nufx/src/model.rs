//! In-memory archive model (`spec.md` §3, §4.E).
//!
//! Grounded in `NuRecord`/`NuThread`/`NuMasterHeader`
//! (`original_source/nufxlib-0/NufxLib.h`), reshaped per `spec.md` §9's
//! "pointer graphs inside records" design note: the source shares raw
//! pointers between records, thread arrays, and modification lists; here
//! records live in an arena (`Archive::records: Vec<Record>`, see
//! `archive.rs`) and are referenced by stable index newtypes instead, the
//! way the teacher keys its own header tables by plain integer offsets
//! rather than pointers (`crates/rar/src/header/mod.rs`).

use crate::codec::ThreadFormat;
use crate::datetime::TimeRec;
use crate::source_sink::Source;

/// Stable index of a `Record` within an `Archive`'s arena. Stays valid
/// across a flush that reloads the TOC (the reload assigns fresh
/// indices; callers that hold one across a flush must re-resolve it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordIdx(pub u32);

/// Stable index of a `Thread` within its owning record's thread array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadIdx(pub u32);

/// `kNuThreadIDWildcard`: matches any class/kind when looking up a thread.
pub const THREAD_ID_WILDCARD: ThreadId = ThreadId { class: 0xFFFF, kind: 0xFFFF };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId {
    pub class: u16,
    pub kind: u16,
}

impl ThreadId {
    pub const fn new(class: u16, kind: u16) -> Self {
        ThreadId { class, kind }
    }

    pub fn matches(&self, other: ThreadId) -> bool {
        *self == THREAD_ID_WILDCARD || other == THREAD_ID_WILDCARD || *self == other
    }
}

/// Thread classes (`NuThreadClass`).
pub mod thread_class {
    pub const MESSAGE: u16 = 0x0000;
    pub const CONTROL: u16 = 0x0001;
    pub const DATA: u16 = 0x0002;
    pub const FILENAME: u16 = 0x0003;
}

/// Thread kinds within the data class (`NuThreadKind`).
pub mod thread_kind {
    pub const DATA_FORK: u16 = 0x0000;
    pub const RSRC_FORK: u16 = 0x0001;
    pub const DISK_IMAGE: u16 = 0x0001;
    pub const COMMENT: u16 = 0x0001;
    pub const OLD_COMMENT: u16 = 0x0000;
}

pub const FILENAME_THREAD: ThreadId = ThreadId::new(thread_class::FILENAME, 0);
pub const COMMENT_THREAD: ThreadId = ThreadId::new(thread_class::MESSAGE, thread_kind::COMMENT);
pub const OLD_COMMENT_THREAD: ThreadId = ThreadId::new(thread_class::MESSAGE, thread_kind::OLD_COMMENT);

/// Default presized reservations (`spec.md` §6 "Presized thread reservation").
pub const DEFAULT_FILENAME_RESERVE: u32 = 32;
pub const DEFAULT_COMMENT_RESERVE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Seedling = 0x0001,
    Sapling = 0x0002,
    Tree = 0x0003,
    Directory = 0x000D,
    /// Anything else is carried through opaquely; ProDOS storage types
    /// outside this small set are legal and must round-trip.
    Other,
}

impl StorageType {
    pub fn from_u16(v: u16) -> Self {
        match v {
            0x0001 => StorageType::Seedling,
            0x0002 => StorageType::Sapling,
            0x0003 => StorageType::Tree,
            0x000D => StorageType::Directory,
            _ => StorageType::Other,
        }
    }

    pub fn to_u16(self, raw: u16) -> u16 {
        match self {
            StorageType::Seedling => 0x0001,
            StorageType::Sapling => 0x0002,
            StorageType::Tree => 0x0003,
            StorageType::Directory => 0x000D,
            StorageType::Other => raw,
        }
    }
}

/// `NuMasterHeader`. Magic bytes are checked/written by `reader.rs` and
/// `writer.rs`; validity is tracked separately here (`spec.md` §3,
/// "Validity is tracked separately so partially-read archives can still
/// be inspected").
#[derive(Debug, Clone)]
pub struct MasterHeader {
    pub total_records: u32,
    pub create_when: TimeRec,
    pub mod_when: TimeRec,
    pub master_version: u16,
    pub master_eof: u32,
    pub is_valid: bool,
}

impl MasterHeader {
    pub const MAX_SUPPORTED_VERSION: u16 = 2;

    pub fn new() -> Self {
        MasterHeader {
            total_records: 0,
            create_when: TimeRec::now(),
            mod_when: TimeRec::now(),
            master_version: Self::MAX_SUPPORTED_VERSION,
            master_eof: 0,
            is_valid: false,
        }
    }
}

impl Default for MasterHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// `NuThread`. `thread_crc`'s meaning depends on the owning record's
/// `version` (`spec.md` §3: "v0-2 = CRC of uncompressed data; v3 = CRC
/// of compressed data" — see `MimicSHK` handling in `archive.rs`).
#[derive(Debug, Clone)]
pub struct Thread {
    pub thread_idx: ThreadIdx,
    pub id: ThreadId,
    pub format: ThreadFormat,
    pub thread_crc: u16,
    pub thread_eof: u32,
    pub comp_thread_eof: u32,
    /// For disk-image threads, the true (post-rounding) size, which can
    /// differ from `thread_eof`.
    pub actual_eof: u32,
    /// Absolute file offset of this thread's data, set while reading an
    /// existing archive; `None` for threads staged but not yet flushed.
    pub file_offset: Option<u64>,
    used: bool,
}

impl Thread {
    pub fn new(thread_idx: ThreadIdx, id: ThreadId, format: ThreadFormat) -> Self {
        Thread {
            thread_idx,
            id,
            format,
            thread_crc: 0,
            thread_eof: 0,
            comp_thread_eof: 0,
            actual_eof: 0,
            file_offset: None,
            used: true,
        }
    }

    pub fn is_presized(&self) -> bool {
        self.id == FILENAME_THREAD || self.id == COMMENT_THREAD || self.id == OLD_COMMENT_THREAD
    }
}

/// A pending change to a record's thread array, queued by `add_thread`
/// / `update_presized_thread` / `delete_thread` and applied only at
/// flush (`spec.md` §4.E, §4.G).
pub enum ThreadMod {
    Add {
        id: ThreadId,
        format: ThreadFormat,
        source: Source,
    },
    UpdatePresized {
        thread_idx: ThreadIdx,
        source: Source,
        max_len: u32,
    },
    Delete {
        thread_idx: ThreadIdx,
    },
}

impl ThreadMod {
    /// The thread index this modification targets, where applicable
    /// (`Add` has none yet — it's assigned at flush).
    pub fn target_thread(&self) -> Option<ThreadIdx> {
        match self {
            ThreadMod::Add { .. } => None,
            ThreadMod::UpdatePresized { thread_idx, .. } => Some(*thread_idx),
            ThreadMod::Delete { thread_idx } => Some(*thread_idx),
        }
    }
}

/// `NuRecord`. Carries both the on-disk fields (`spec.md` §6, record
/// header layout) and the reader/writer-derived bookkeeping fields
/// called out in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordAttr {
    pub access: u32,
    pub file_type: u32,
    pub extra_type: u32,
    pub storage_type: u16,
}

pub struct Record {
    pub record_idx: RecordIdx,
    pub version: u16,
    pub file_sys_id: u16,
    pub file_sys_info: u16,
    pub attr: RecordAttr,
    pub create_when: TimeRec,
    pub mod_when: TimeRec,
    pub archive_when: TimeRec,
    pub option_list: Vec<u8>,
    pub extra_bytes: Vec<u8>,
    /// Inline filename from the record header itself; used when there is
    /// no filename-class thread (older archives). Invariant (`spec.md`
    /// §3): exactly one of this field or a filename thread yields the
    /// effective name.
    pub inline_filename: Option<String>,
    pub threads: Vec<Thread>,
    pub pending_mods: Vec<ThreadMod>,
    /// Set when record attributes change without a thread modification,
    /// so the header still gets rewritten at flush (`spec.md` §4.E).
    pub dirty_header: bool,
    /// Marks this record for omission at the next flush. A property of
    /// the archive's deletion list, not a `ThreadMod` (`spec.md` §4.G).
    pub marked_for_deletion: bool,
    /// File offset of this record's header, set once read from or
    /// written to disk.
    pub file_offset: Option<u64>,
    next_thread_idx: u32,
}

impl Record {
    pub fn new(record_idx: RecordIdx, attr: RecordAttr) -> Self {
        let now = TimeRec::now();
        Record {
            record_idx,
            version: 3,
            file_sys_id: 0,
            file_sys_info: u16::from(b'/'),
            attr,
            create_when: now,
            mod_when: now,
            archive_when: TimeRec::NO_DATE,
            option_list: Vec::new(),
            extra_bytes: Vec::new(),
            inline_filename: None,
            threads: Vec::new(),
            pending_mods: Vec::new(),
            dirty_header: false,
            marked_for_deletion: false,
            file_offset: None,
            next_thread_idx: 0,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_header || !self.pending_mods.is_empty()
    }

    pub fn alloc_thread_idx(&mut self) -> ThreadIdx {
        let idx = ThreadIdx(self.next_thread_idx);
        self.next_thread_idx += 1;
        idx
    }

    pub fn thread_by_idx(&self, idx: ThreadIdx) -> Option<&Thread> {
        self.threads.iter().find(|t| t.thread_idx == idx)
    }

    pub fn thread_by_idx_mut(&mut self, idx: ThreadIdx) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.thread_idx == idx)
    }

    /// First thread matching `id`, honoring `THREAD_ID_WILDCARD`
    /// (`spec.md` §4.E).
    pub fn find_thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id.matches(id))
    }

    /// The effective filename: a filename-class thread overrides the
    /// inline name (`spec.md` §3, thread invariants). Resolving the
    /// thread's actual bytes is the reader/writer's job; this only
    /// expresses precedence.
    pub fn has_filename_thread(&self) -> bool {
        self.find_thread(FILENAME_THREAD).is_some()
    }

    pub fn effective_name_source(&self) -> EffectiveName {
        if self.has_filename_thread() {
            EffectiveName::FilenameThread
        } else if self.inline_filename.is_some() {
            EffectiveName::Inline
        } else {
            EffectiveName::None
        }
    }

    pub fn total_threads(&self) -> u32 {
        self.threads.len() as u32
    }

    pub fn total_compressed_len(&self) -> u64 {
        self.threads.iter().map(|t| t.comp_thread_eof as u64).sum()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("record_idx", &self.record_idx)
            .field("version", &self.version)
            .field("inline_filename", &self.inline_filename)
            .field("threads", &self.threads)
            .field("marked_for_deletion", &self.marked_for_deletion)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveName {
    FilenameThread,
    Inline,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_anything() {
        let concrete = ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK);
        assert!(THREAD_ID_WILDCARD.matches(concrete));
        assert!(concrete.matches(THREAD_ID_WILDCARD));
        assert!(!concrete.matches(ThreadId::new(thread_class::DATA, thread_kind::RSRC_FORK)));
    }

    #[test]
    fn record_dirty_tracks_header_and_mods() {
        let attr = RecordAttr {
            access: 0,
            file_type: 0,
            extra_type: 0,
            storage_type: 0,
        };
        let mut rec = Record::new(RecordIdx(0), attr);
        assert!(!rec.is_dirty());
        rec.dirty_header = true;
        assert!(rec.is_dirty());
    }

    #[test]
    fn presized_threads_are_identified() {
        let t = Thread::new(ThreadIdx(0), FILENAME_THREAD, ThreadFormat::Uncompressed);
        assert!(t.is_presized());
        let t2 = Thread::new(ThreadIdx(1), ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK), ThreadFormat::Uncompressed);
        assert!(!t2.is_presized());
    }

    #[test]
    fn effective_name_precedence() {
        let attr = RecordAttr {
            access: 0,
            file_type: 0,
            extra_type: 0,
            storage_type: 0,
        };
        let mut rec = Record::new(RecordIdx(0), attr);
        assert_eq!(rec.effective_name_source(), EffectiveName::None);
        rec.inline_filename = Some("HELLO".into());
        assert_eq!(rec.effective_name_source(), EffectiveName::Inline);
        let idx = rec.alloc_thread_idx();
        rec.threads.push(Thread::new(idx, FILENAME_THREAD, ThreadFormat::Uncompressed));
        assert_eq!(rec.effective_name_source(), EffectiveName::FilenameThread);
    }
}
