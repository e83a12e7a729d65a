//! Command implementations wired to `nufx::Archive`, one per action in
//! `spec.md` §6's modifier table. Kept free of `clap` types so they can
//! be exercised directly from tests without going through argument
//! parsing or process spawning.

use std::fs;
use std::path::{Path, PathBuf};

use nufx::{
    thread_class, thread_kind, Archive, EolConvert, Error as NufxError, RecordAttr, Result as NufxResult, ThreadFormat,
    ThreadId,
};

use crate::filename::{decode_host_name, encode_host_name, ForkMarker, TypeInfo};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Nufx(#[from] NufxError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no files specified to add")]
    NoFiles,
}

pub type CliResult<T> = std::result::Result<T, CliError>;

/// `-l`: one name per line.
pub fn list_short(archive_path: &Path) -> CliResult<Vec<String>> {
    let mut archive = Archive::open_read_only(archive_path)?;
    let mut names = Vec::new();
    let idxs: Vec<_> = archive.records().iter().map(|r| r.record_idx).collect();
    for idx in idxs {
        if let Some(name) = archive.effective_name(idx)? {
            names.push(name);
        }
    }
    Ok(names)
}

/// `-v`/`-ll`: name, size, compressed size, format, and modification date.
pub fn list_verbose(archive_path: &Path) -> CliResult<Vec<VerboseEntry>> {
    let mut archive = Archive::open_read_only(archive_path)?;
    let mut out = Vec::new();
    let idxs: Vec<_> = archive.records().iter().map(|r| r.record_idx).collect();
    for idx in idxs {
        let name = archive.effective_name(idx)?.unwrap_or_else(|| "(unnamed)".to_string());
        let record = archive.record(idx).expect("idx came from records()");
        let data_thread = record.find_thread(ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK));
        let (format, uncompressed_len, compressed_len) = match data_thread {
            Some(t) => (t.format, t.thread_eof as u64, t.comp_thread_eof as u64),
            None => (ThreadFormat::Uncompressed, 0, 0),
        };
        out.push(VerboseEntry {
            name,
            uncompressed_len,
            compressed_len,
            format,
            mod_when: record.mod_when.to_unix_timestamp(),
        });
    }
    Ok(out)
}

pub struct VerboseEntry {
    pub name: String,
    pub uncompressed_len: u64,
    pub compressed_len: u64,
    pub format: ThreadFormat,
    pub mod_when: Option<i64>,
}

/// `-t`: decode every data thread and let CRC validation stand in for
/// the "file is intact" check; no bytes are written anywhere.
pub fn test_archive(archive_path: &Path) -> CliResult<TestReport> {
    let mut archive = Archive::open_read_only(archive_path)?;
    let mut report = TestReport::default();
    let idxs: Vec<_> = archive.records().iter().map(|r| r.record_idx).collect();
    for idx in idxs {
        let name = archive.effective_name(idx)?.unwrap_or_else(|| "(unnamed)".to_string());
        match archive.extract_thread(idx, ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK)) {
            Ok(_) => report.passed.push(name),
            Err(NufxError::ThreadIDNotFound) => report.passed.push(name),
            Err(err) => report.failed.push((name, err)),
        }
    }
    Ok(report)
}

#[derive(Default)]
pub struct TestReport {
    pub passed: Vec<String>,
    pub failed: Vec<(String, NufxError)>,
}

impl TestReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// `-x`/`-p`: extract every record's data fork to `dest_dir`, or
/// concatenate to stdout when `dest_dir` is `None` (pipe mode, `-p`).
/// Host filenames carry the ProDOS type/aux-type suffix encoding from
/// `spec.md` §6 so a later `-a` of the extracted tree could restore it.
pub fn extract(archive_path: &Path, dest_dir: Option<&Path>, eol_convert: EolConvert) -> CliResult<Vec<PathBuf>> {
    let mut archive = Archive::open_read_only(archive_path)?;
    archive.config_mut().set_convert_extracted_eol(eol_convert)?;
    let mut written = Vec::new();
    let idxs: Vec<_> = archive.records().iter().map(|r| r.record_idx).collect();

    for idx in idxs {
        let name = archive.effective_name(idx)?.unwrap_or_else(|| format!("record_{}", idx.0));
        let data = match archive.extract_thread(idx, ThreadId::new(thread_class::DATA, thread_kind::DATA_FORK)) {
            Ok(bytes) => bytes,
            Err(NufxError::ThreadIDNotFound) => continue,
            Err(err) => return Err(err.into()),
        };

        match dest_dir {
            None => {
                use std::io::Write;
                std::io::stdout().write_all(&data)?;
            }
            Some(dir) => {
                let record = archive.record(idx).expect("idx came from records()");
                let host_name = encode_host_name(
                    &name,
                    TypeInfo::ProDos {
                        file_type: record.attr.file_type as u8,
                        aux_type: record.attr.extra_type as u16,
                    },
                    ForkMarker::None,
                );
                let out_path = dir.join(sanitize_path_component(&host_name));
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&out_path, &data)?;
                written.push(out_path);
            }
        }
    }
    Ok(written)
}

/// Rejects a decoded effective name that still carries NuFX's own path
/// separator so extraction never escapes `dest_dir`.
fn sanitize_path_component(name: &str) -> String {
    name.replace('/', "_").replace('\\', "_")
}

/// `-a`: adds each host file in `sources` to the archive (creating it
/// if necessary), decoding any `#...` type suffix the file carries.
pub fn add(archive_path: &Path, sources: &[PathBuf], format: ThreadFormat) -> CliResult<Vec<String>> {
    if sources.is_empty() {
        return Err(CliError::NoFiles);
    }

    let mut archive = if archive_path.exists() {
        Archive::open_read_write(archive_path)?
    } else {
        Archive::create_new(archive_path)
    };

    let mut added = Vec::new();
    for src in sources {
        let file_name = src
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CliError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "non-UTF8 filename")))?;
        let decoded = decode_host_name(file_name);
        let data = fs::read(src)?;

        let attr = RecordAttr {
            access: 0xc3,
            file_type: match decoded.type_info {
                TypeInfo::ProDos { file_type, .. } => file_type as u32,
                _ => 0x04,
            },
            extra_type: match decoded.type_info {
                TypeInfo::ProDos { aux_type, .. } => aux_type as u32,
                _ => 0,
            },
            storage_type: 1,
        };
        let mod_when = fs::metadata(src)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
            .map(|d| nufx::TimeRec::from_unix_timestamp(d.as_secs() as i64))
            .unwrap_or(nufx::TimeRec::NO_DATE);

        archive.add_file_checked(attr, &decoded.stored_name, data, format, mod_when)?;
        added.push(decoded.stored_name);
    }

    archive.flush()?;
    Ok(added)
}

/// `-d`: marks each named record deleted and flushes the removal.
pub fn delete(archive_path: &Path, names: &[String]) -> CliResult<Vec<String>> {
    let mut archive = Archive::open_read_write(archive_path)?;
    let mut deleted = Vec::new();
    for name in names {
        match archive.record_by_name(name)? {
            Some(idx) => {
                archive.mark_delete_record(idx)?;
                deleted.push(name.clone());
            }
            None => return Err(NufxError::RecNameNotFound(name.clone()).into()),
        }
    }
    archive.flush()?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nufx::TimeRec;

    fn tmp_archive(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nulib-cmd-{}-{}.shk", label, std::process::id()))
    }

    #[test]
    fn add_then_list_then_extract_roundtrip() {
        let archive_path = tmp_archive("roundtrip");
        let _ = fs::remove_file(&archive_path);
        let src_dir = std::env::temp_dir().join(format!("nulib-src-{}", std::process::id()));
        fs::create_dir_all(&src_dir).unwrap();
        let src_file = src_dir.join("HELLO.TXT");
        fs::write(&src_file, b"hello world").unwrap();

        let added = add(&archive_path, &[src_file.clone()], ThreadFormat::Uncompressed).unwrap();
        assert_eq!(added, vec!["HELLO.TXT".to_string()]);

        let names = list_short(&archive_path).unwrap();
        assert_eq!(names, vec!["HELLO.TXT".to_string()]);

        let dest_dir = std::env::temp_dir().join(format!("nulib-dest-{}", std::process::id()));
        let written = extract(&archive_path, Some(&dest_dir), EolConvert::Off).unwrap();
        assert_eq!(written.len(), 1);
        let extracted = fs::read(&written[0]).unwrap();
        assert_eq!(extracted, b"hello world");

        let report = test_archive(&archive_path).unwrap();
        assert!(report.all_ok());

        let _ = fs::remove_file(&archive_path);
        let _ = fs::remove_dir_all(&src_dir);
        let _ = fs::remove_dir_all(&dest_dir);
    }

    #[test]
    fn delete_removes_named_record() {
        let archive_path = tmp_archive("delete");
        let _ = fs::remove_file(&archive_path);
        let mut archive = Archive::create_new(&archive_path);
        let attr = RecordAttr {
            access: 0xc3,
            file_type: 0x04,
            extra_type: 0,
            storage_type: 1,
        };
        archive
            .add_file_checked(attr, "GONE.TXT", b"bye".to_vec(), ThreadFormat::Uncompressed, TimeRec::NO_DATE)
            .unwrap();
        archive.flush().unwrap();
        drop(archive);

        let deleted = delete(&archive_path, &["GONE.TXT".to_string()]).unwrap();
        assert_eq!(deleted, vec!["GONE.TXT".to_string()]);

        let names = list_short(&archive_path).unwrap();
        assert!(names.is_empty());

        let _ = fs::remove_file(&archive_path);
    }
}
