//! Error taxonomy for the archive engine.
//!
//! Grounded in `NuError` (`original_source/nufxlib-0/NufxLib.h`): each
//! variant group below corresponds to one of that enum's numeric bands
//! (programmer / I/O / format / buffer / search / policy / callback).

use std::path::PathBuf;

use crate::model::{RecordIdx, ThreadIdx};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- programmer errors --
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),
    #[error("bad internal structure: {0}")]
    BadStruct(&'static str),
    #[error("archive is busy (reentrant call rejected)")]
    Busy,

    // -- callback outcomes --
    #[error("operation skipped by callback")]
    Skipped,
    #[error("operation aborted by callback")]
    Aborted,

    // -- I/O errors --
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file already exists: {0}")]
    FileExists(PathBuf),
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    // -- format errors --
    #[error("not a NuFX archive (missing 'NuFile'/'NuFX' signature)")]
    NotNuFX,
    #[error("unsupported master header version {0}")]
    BadMHVersion(u16),
    #[error("unsupported record header version {0}")]
    BadRecordVersion(u16),
    #[error("record header not found (corrupted archive?)")]
    RecHdrNotFound,
    #[error("archive contains no records")]
    NoRecords,
    #[error("malformed record")]
    BadRecord,
    #[error("bad master header CRC")]
    BadMHCRC,
    #[error("bad record header CRC (record {0:?})")]
    BadRHCRC(RecordIdx),
    #[error("bad thread header CRC (thread {0:?})")]
    BadThreadCRC(ThreadIdx),
    #[error("bad data CRC (decoded content does not match the stored checksum)")]
    BadDataCRC,
    #[error("unsupported compression format {0}")]
    BadFormat(u16),
    #[error("decoder rejected input data")]
    BadData,

    // -- buffer errors --
    #[error("buffer overrun")]
    BufferOverrun,
    #[error("buffer underrun")]
    BufferUnderrun,
    #[error("output limit exceeded")]
    OutMax,

    // -- search errors --
    #[error("not found")]
    NotFound,
    #[error("record not found")]
    RecordNotFound,
    #[error("record index not found: {0:?}")]
    RecIdxNotFound(RecordIdx),
    #[error("thread index not found: {0:?}")]
    ThreadIdxNotFound(ThreadIdx),
    #[error("thread ID not found")]
    ThreadIDNotFound,
    #[error("record name not found: {0}")]
    RecNameNotFound(String),
    #[error("a record with that name already exists")]
    RecordExists,

    // -- policy errors --
    #[error("attempted to delete every record in the archive")]
    AllDeleted,
    #[error("archive is open read-only")]
    ArchiveRO,
    #[error("record already has a pending modification")]
    ModRecChange,
    #[error("thread already has a pending modification")]
    ModThreadChange,
    #[error("adding that thread would create a conflict")]
    ThreadAdd,
    #[error("thread is not pre-sized")]
    NotPreSized,
    #[error("data exceeds the thread's pre-sized allocation")]
    PreSizeOverflow,
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
    #[error("filename has a leading path separator")]
    LeadingFssep,
    #[error("existing entry is not older than the one being added")]
    NotNewer,
    #[error("must-overwrite set but no duplicate entry exists")]
    DuplicateNotFound,
    #[error("archive may be damaged")]
    Damaged,
    #[error("this looks like a Binary II archive, not NuFX")]
    IsBinary2,
    #[error("unknown feature")]
    UnknownFeature,
    #[error("feature not supported in this build")]
    UnsupportedFeature,

    // -- flush outcomes --
    #[error("flush failed: archive is inaccessible (rename-over-original failed)")]
    FlushInaccessible,
}

impl Error {
    /// Mirrors `NuStrError`: a stable, context-free description for every
    /// error kind, independent of the fields a particular instance carries.
    pub fn static_description(&self) -> &'static str {
        match self {
            Error::InvalidArg(_) => "invalid argument",
            Error::BadStruct(_) => "bad internal structure",
            Error::Busy => "archive busy",
            Error::Skipped => "skipped by request",
            Error::Aborted => "aborted by request",
            Error::Io(_) => "I/O error",
            Error::FileExists(_) => "file exists",
            Error::FileNotFound(_) => "file not found",
            Error::NotNuFX => "not a NuFX archive",
            Error::BadMHVersion(_) => "bad master header version",
            Error::BadRecordVersion(_) => "bad record header version",
            Error::RecHdrNotFound => "record header not found",
            Error::NoRecords => "archive has no records",
            Error::BadRecord => "bad record",
            Error::BadMHCRC => "bad master header CRC",
            Error::BadRHCRC(_) => "bad record header CRC",
            Error::BadThreadCRC(_) => "bad thread header CRC",
            Error::BadDataCRC => "bad data CRC",
            Error::BadFormat(_) => "unsupported compression format",
            Error::BadData => "decoder rejected data",
            Error::BufferOverrun => "buffer overrun",
            Error::BufferUnderrun => "buffer underrun",
            Error::OutMax => "output limit exceeded",
            Error::NotFound => "not found",
            Error::RecordNotFound => "record not found",
            Error::RecIdxNotFound(_) => "record index not found",
            Error::ThreadIdxNotFound(_) => "thread index not found",
            Error::ThreadIDNotFound => "thread ID not found",
            Error::RecNameNotFound(_) => "record name not found",
            Error::RecordExists => "record already exists",
            Error::AllDeleted => "attempted to delete all records",
            Error::ArchiveRO => "archive is read-only",
            Error::ModRecChange => "record already modified",
            Error::ModThreadChange => "thread already modified",
            Error::ThreadAdd => "thread add conflict",
            Error::NotPreSized => "thread is not pre-sized",
            Error::PreSizeOverflow => "pre-size overflow",
            Error::InvalidFilename(_) => "invalid filename",
            Error::LeadingFssep => "leading path separator in name",
            Error::NotNewer => "not newer than existing entry",
            Error::DuplicateNotFound => "duplicate not found",
            Error::Damaged => "archive damaged",
            Error::IsBinary2 => "looks like Binary II",
            Error::UnknownFeature => "unknown feature",
            Error::UnsupportedFeature => "unsupported feature",
            Error::FlushInaccessible => "flush left archive inaccessible",
        }
    }

    /// True for the subset of errors §7 calls "recoverable" when the
    /// caller's error handler returns `Ignore` and the relevant value is
    /// set (e.g. `IgnoreCRC`).
    pub fn is_crc_error(&self) -> bool {
        matches!(
            self,
            Error::BadMHCRC | Error::BadRHCRC(_) | Error::BadThreadCRC(_) | Error::BadDataCRC
        )
    }
}
