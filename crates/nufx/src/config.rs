//! Archive configuration values (`spec.md` §4.J "Configuration values").
//!
//! Grounded in `Nu_GetValue`/`Nu_SetValue`
//! (`original_source/nufxlib-0/Value.c`): each value has an enumerated
//! legal range and `set_*` rejects anything outside it, matching the
//! source's per-field range check translated into a typed setter instead
//! of an untyped `(ValueID, i32)` pair.

use crate::codec::ThreadFormat;
use crate::error::{Error, Result};
use crate::source_sink::{Eol, EolConvert};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleExisting {
    MaybeOverwrite,
    NeverOverwrite,
    AlwaysOverwrite,
    AskOverwrite,
    MustOverwrite,
}

#[derive(Debug, Clone)]
pub struct Config {
    allow_duplicates: bool,
    convert_extracted_eol: EolConvert,
    data_compression: ThreadFormat,
    discard_wrapper: bool,
    eol: Eol,
    handle_existing: HandleExisting,
    ignore_crc: bool,
    mimic_shk: bool,
    modify_orig: bool,
    only_update_older: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allow_duplicates: false,
            convert_extracted_eol: EolConvert::Off,
            data_compression: ThreadFormat::HuffmanSQ,
            discard_wrapper: false,
            eol: Eol::Lf,
            handle_existing: HandleExisting::MaybeOverwrite,
            ignore_crc: false,
            mimic_shk: false,
            modify_orig: true,
            only_update_older: false,
        }
    }
}

macro_rules! accessor {
    ($get:ident, $set:ident, $field:ident, $ty:ty) => {
        pub fn $get(&self) -> $ty {
            self.$field
        }
        pub fn $set(&mut self, value: $ty) -> Result<()> {
            self.$field = value;
            Ok(())
        }
    };
}

impl Config {
    accessor!(allow_duplicates, set_allow_duplicates, allow_duplicates, bool);
    accessor!(discard_wrapper, set_discard_wrapper, discard_wrapper, bool);
    accessor!(ignore_crc, set_ignore_crc, ignore_crc, bool);
    accessor!(mimic_shk, set_mimic_shk, mimic_shk, bool);
    accessor!(modify_orig, set_modify_orig, modify_orig, bool);
    accessor!(only_update_older, set_only_update_older, only_update_older, bool);

    pub fn convert_extracted_eol(&self) -> EolConvert {
        self.convert_extracted_eol
    }
    pub fn set_convert_extracted_eol(&mut self, value: EolConvert) -> Result<()> {
        self.convert_extracted_eol = value;
        Ok(())
    }

    pub fn eol(&self) -> Eol {
        self.eol
    }
    pub fn set_eol(&mut self, value: Eol) -> Result<()> {
        self.eol = value;
        Ok(())
    }

    pub fn handle_existing(&self) -> HandleExisting {
        self.handle_existing
    }
    pub fn set_handle_existing(&mut self, value: HandleExisting) -> Result<()> {
        self.handle_existing = value;
        Ok(())
    }

    pub fn data_compression(&self) -> ThreadFormat {
        self.data_compression
    }

    /// Rejects `Deflate`/`Bzip2` unless the caller is certain a plugin
    /// codec is wired up — the core codec registry treats both as
    /// `UnsupportedFeature` (`spec.md` §4.D).
    pub fn set_data_compression(&mut self, value: ThreadFormat) -> Result<()> {
        if matches!(value, ThreadFormat::Deflate | ThreadFormat::Bzip2) {
            return Err(Error::InvalidArg("data compression: deflate/bzip2 require an external plugin"));
        }
        self.data_compression = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unplugged_compression_backends() {
        let mut cfg = Config::default();
        assert!(cfg.set_data_compression(ThreadFormat::Deflate).is_err());
        assert!(cfg.set_data_compression(ThreadFormat::Lzw1).is_ok());
        assert_eq!(cfg.data_compression(), ThreadFormat::Lzw1);
    }

    #[test]
    fn default_matches_spec_baseline() {
        let cfg = Config::default();
        assert!(!cfg.ignore_crc());
        assert!(cfg.modify_orig());
    }
}
