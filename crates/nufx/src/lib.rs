//! NuFX (ShrinkIt) archive engine: master/record/thread parser and
//! transactional writer, the codec registry (store/SQ/LZW1/LZW2/LZC),
//! and a Binary II decoder, per `spec.md` §§1-4.
//!
//! Module layout follows `spec.md` §2's component table: `byteio` (A),
//! `datetime` (B), `source_sink` (C), `codec` (D), `model` (E),
//! `reader` (F), `writer` (G), `wrapper` (H), `binary2` (I), `archive`
//! (J, the public façade).

#![allow(dead_code)]

mod archive;
mod binary2;
mod byteio;
mod codec;
mod config;
mod datetime;
mod error;
mod model;
mod reader;
mod source_sink;
mod wrapper;

pub use archive::{Archive, CallbackOutcome, Callbacks, OpenMode};
pub use binary2::{Binary2Header, DataFlags, Entry as Binary2Entry};
pub use codec::ThreadFormat;
pub use config::{Config, HandleExisting};
pub use datetime::TimeRec;
pub use error::{Error, Result};
pub use model::{
    thread_class, thread_kind, EffectiveName, Record, RecordAttr, RecordIdx, StorageType, Thread, ThreadId,
    ThreadIdx, COMMENT_THREAD, FILENAME_THREAD, OLD_COMMENT_THREAD, THREAD_ID_WILDCARD,
};
pub use source_sink::{Eol, EolConvert, Sink, Source};
pub use wrapper::Wrapper;

/// Build identity mirroring `NuGetVersion` (`spec.md` §9 "Supplemented
/// features"): the semver of this crate, queryable without constructing
/// an `Archive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

pub fn version() -> Version {
    Version {
        major: 0,
        minor: 1,
        patch: 0,
    }
}

/// Feature probe mirroring `NuTestFeature`/`NuFeature` (`spec.md` §9):
/// lets a caller ask whether a given compression format can actually be
/// used before staging an `add` with it.
pub fn supports_format(format: ThreadFormat) -> bool {
    !matches!(format, ThreadFormat::Deflate | ThreadFormat::Bzip2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_well_formed() {
        let v = version();
        assert_eq!(v.to_string(), "0.1.0");
    }

    #[test]
    fn supports_format_excludes_unplugged_backends() {
        assert!(supports_format(ThreadFormat::Lzw2));
        assert!(!supports_format(ThreadFormat::Deflate));
    }
}
