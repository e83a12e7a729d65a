//! Streaming data sources and sinks (`spec.md` §3 "Data source"/"Data
//! sink", §4.C).
//!
//! Modeled as closed tagged enums rather than a trait-object/vtable the
//! way the design notes (`spec.md` §9) call for: "the three shapes (path,
//! handle+offset+length, buffer+offset+length) are closed and small."
//! This mirrors the teacher's preference for concrete enums over dynamic
//! dispatch when the variant set is known and small (e.g.
//! `crates/rar/src/header/mod.rs`'s `HeaderType`).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::ThreadFormat;
use crate::error::{Error, Result};

/// End-of-line conversion mode for a sink (`spec.md` §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolConvert {
    Off,
    On,
    Auto,
}

/// The system end-of-line sequence a sink converts *to* when conversion
/// is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Cr,
    Lf,
    CrLf,
}

impl Eol {
    fn bytes(self) -> &'static [u8] {
        match self {
            Eol::Cr => b"\r",
            Eol::Lf => b"\n",
            Eol::CrLf => b"\r\n",
        }
    }
}

/// A byte source handed to the writer during flush. Each source is read
/// **at most once** (`spec.md` §3 invariant); `Source::read` enforces
/// this by erroring if called after EOF has already been reported once
/// and the source has no more bytes to give.
pub enum DataSource {
    FileByPath {
        path: PathBuf,
        consume_and_close: bool,
        file: Option<File>,
    },
    FileHandle {
        file: File,
        offset: u64,
        length: u64,
        read_so_far: u64,
    },
    Buffer {
        data: Vec<u8>,
        pos: usize,
    },
}

/// Metadata describing what a `DataSource`'s bytes already are.
pub struct SourceInfo {
    pub thread_format: ThreadFormat,
    pub compressed_len: u64,
    pub other_len: u64,
    pub raw_crc: Option<u16>,
}

pub struct Source {
    inner: DataSource,
    pub info: SourceInfo,
    consumed: bool,
}

impl Source {
    pub fn from_path(
        path: impl AsRef<Path>,
        thread_format: ThreadFormat,
        other_len: u64,
    ) -> Self {
        Source {
            inner: DataSource::FileByPath {
                path: path.as_ref().to_path_buf(),
                consume_and_close: true,
                file: None,
            },
            info: SourceInfo {
                thread_format,
                compressed_len: 0,
                other_len,
                raw_crc: None,
            },
            consumed: false,
        }
    }

    pub fn from_file_handle(file: File, offset: u64, length: u64, thread_format: ThreadFormat) -> Self {
        Source {
            inner: DataSource::FileHandle {
                file,
                offset,
                length,
                read_so_far: 0,
            },
            info: SourceInfo {
                thread_format,
                compressed_len: 0,
                other_len: length,
                raw_crc: None,
            },
            consumed: false,
        }
    }

    pub fn from_buffer(data: Vec<u8>, thread_format: ThreadFormat) -> Self {
        let len = data.len() as u64;
        Source {
            inner: DataSource::Buffer { data, pos: 0 },
            info: SourceInfo {
                thread_format,
                compressed_len: 0,
                other_len: len,
                raw_crc: None,
            },
            consumed: false,
        }
    }

    pub fn set_raw_crc(&mut self, crc: u16) {
        self.info.raw_crc = Some(crc);
    }

    pub fn set_compressed_len(&mut self, len: u64) {
        self.info.compressed_len = len;
    }

    /// Rewind only works on non-streaming sources; a `FileByPath` source
    /// already declared consume-and-close fails loudly, matching
    /// `spec.md` §4.C.
    pub fn rewind(&mut self) -> Result<()> {
        match &mut self.inner {
            DataSource::FileByPath {
                consume_and_close,
                file,
                ..
            } => {
                if *consume_and_close && file.is_some() {
                    return Err(Error::InvalidArg(
                        "cannot rewind a consume-and-close file source after it has been opened",
                    ));
                }
                if let Some(f) = file {
                    f.seek(SeekFrom::Start(0))?;
                }
                Ok(())
            }
            DataSource::FileHandle {
                file,
                offset,
                read_so_far,
                ..
            } => {
                file.seek(SeekFrom::Start(*offset))?;
                *read_so_far = 0;
                Ok(())
            }
            DataSource::Buffer { pos, .. } => {
                *pos = 0;
                Ok(())
            }
        }
        .map(|_| self.consumed = false)
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DataSource::FileByPath { path, file, .. } => {
                if file.is_none() {
                    *file = Some(File::open(&path)?);
                }
                let n = file.as_mut().unwrap().read(buf)?;
                if n == 0 {
                    self.consumed = true;
                }
                Ok(n)
            }
            DataSource::FileHandle {
                file,
                length,
                read_so_far,
                ..
            } => {
                let remaining = length.saturating_sub(*read_so_far);
                if remaining == 0 {
                    self.consumed = true;
                    return Ok(0);
                }
                let want = (buf.len() as u64).min(remaining) as usize;
                let n = file.read(&mut buf[..want])?;
                *read_so_far += n as u64;
                Ok(n)
            }
            DataSource::Buffer { data, pos } => {
                let remaining = data.len() - *pos;
                if remaining == 0 {
                    self.consumed = true;
                    return Ok(0);
                }
                let want = buf.len().min(remaining);
                buf[..want].copy_from_slice(&data[*pos..*pos + want]);
                *pos += want;
                Ok(want)
            }
        }
    }
}

/// A byte sink the writer/extractor streams decoded bytes into.
pub enum DataSink {
    FileByPath { path: PathBuf, file: Option<File> },
    FileHandle { file: File },
    Buffer { buf: Vec<u8>, cap: usize },
}

pub struct Sink {
    inner: DataSink,
    pub do_expand: bool,
    pub eol_convert: EolConvert,
    pub eol: Eol,
    out_count: u64,
    auto_prefix: Vec<u8>,
    auto_decided_passthrough: Option<bool>,
    last_byte_was_cr: bool,
}

const AUTO_PREFIX_LEN: usize = 512;

impl Sink {
    pub fn to_path(path: impl AsRef<Path>, do_expand: bool, eol_convert: EolConvert, eol: Eol) -> Self {
        Sink {
            inner: DataSink::FileByPath {
                path: path.as_ref().to_path_buf(),
                file: None,
            },
            do_expand,
            eol_convert,
            eol,
            out_count: 0,
            auto_prefix: Vec::new(),
            auto_decided_passthrough: None,
            last_byte_was_cr: false,
        }
    }

    pub fn to_file_handle(file: File, do_expand: bool, eol_convert: EolConvert, eol: Eol) -> Self {
        Sink {
            inner: DataSink::FileHandle { file },
            do_expand,
            eol_convert,
            eol,
            out_count: 0,
            auto_prefix: Vec::new(),
            auto_decided_passthrough: None,
            last_byte_was_cr: false,
        }
    }

    pub fn to_buffer(capacity: usize, do_expand: bool, eol_convert: EolConvert, eol: Eol) -> Self {
        Sink {
            inner: DataSink::Buffer {
                buf: Vec::with_capacity(capacity),
                cap: capacity,
            },
            do_expand,
            eol_convert,
            eol,
            out_count: 0,
            auto_prefix: Vec::new(),
            auto_decided_passthrough: None,
            last_byte_was_cr: false,
        }
    }

    pub fn out_count(&self) -> u64 {
        self.out_count
    }

    pub fn into_buffer(self) -> Option<Vec<u8>> {
        match self.inner {
            DataSink::Buffer { buf, .. } => Some(buf),
            _ => None,
        }
    }

    fn raw_write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match &mut self.inner {
            DataSink::FileByPath { path, file } => {
                if file.is_none() {
                    *file = Some(File::create(&path)?);
                }
                file.as_mut().unwrap().write_all(bytes)?;
            }
            DataSink::FileHandle { file } => file.write_all(bytes)?,
            DataSink::Buffer { buf, cap } => {
                if buf.len() + bytes.len() > *cap {
                    return Err(Error::BufferOverrun);
                }
                buf.extend_from_slice(bytes);
            }
        }
        self.out_count += bytes.len() as u64;
        Ok(())
    }

    fn is_text_byte(b: u8) -> bool {
        (0x20..=0x7e).contains(&b) || b == b'\r' || b == b'\n' || b == b'\t'
    }

    /// Write `bytes`, applying the sink's configured EOL conversion.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self.eol_convert {
            EolConvert::Off => self.raw_write(bytes),
            EolConvert::On => self.write_converted(bytes),
            EolConvert::Auto => self.write_auto(bytes),
        }
    }

    fn write_converted(&mut self, bytes: &[u8]) -> Result<()> {
        let mut out = Vec::with_capacity(bytes.len());
        for &b in bytes {
            match b {
                b'\r' => {
                    out.extend_from_slice(self.eol.bytes());
                    self.last_byte_was_cr = true;
                    continue;
                }
                b'\n' => {
                    if self.last_byte_was_cr {
                        // part of a CRLF pair already emitted for the CR
                        self.last_byte_was_cr = false;
                        continue;
                    }
                    out.extend_from_slice(self.eol.bytes());
                }
                _ => out.push(b),
            }
            self.last_byte_was_cr = false;
        }
        self.raw_write(&out)
    }

    fn write_auto(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(passthrough) = self.auto_decided_passthrough {
            return if passthrough {
                self.raw_write(bytes)
            } else {
                self.write_converted(bytes)
            };
        }

        self.auto_prefix.extend_from_slice(bytes);
        if self.auto_prefix.len() < AUTO_PREFIX_LEN {
            return Ok(());
        }
        self.flush_auto_decision()
    }

    fn flush_auto_decision(&mut self) -> Result<()> {
        let is_text = self.auto_prefix.iter().all(|&b| Self::is_text_byte(b));
        self.auto_decided_passthrough = Some(!is_text);
        let prefix = std::mem::take(&mut self.auto_prefix);
        if is_text {
            self.write_converted(&prefix)
        } else {
            self.raw_write(&prefix)
        }
    }

    /// Must be called once all bytes have been offered, so a prefix
    /// shorter than `AUTO_PREFIX_LEN` still gets a decision.
    pub fn finish(&mut self) -> Result<()> {
        if self.eol_convert == EolConvert::Auto && self.auto_decided_passthrough.is_none() {
            self.flush_auto_decision()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_source_reads_once() {
        let mut src = Source::from_buffer(b"hello".to_vec(), ThreadFormat::Uncompressed);
        let mut buf = [0u8; 16];
        let n = src.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        let n2 = src.read(&mut buf).unwrap();
        assert_eq!(n2, 0);
    }

    #[test]
    fn buffer_sink_rejects_overrun() {
        let mut sink = Sink::to_buffer(4, false, EolConvert::Off, Eol::Lf);
        assert!(sink.write(b"hello").is_err());
    }

    #[test]
    fn eol_conversion_on_crlf_to_lf() {
        let mut sink = Sink::to_buffer(64, false, EolConvert::On, Eol::Lf);
        sink.write(b"a\r\nb\rc\nd").unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.into_buffer().unwrap(), b"a\nb\nc\nd");
    }

    #[test]
    fn eol_conversion_auto_detects_binary() {
        let mut sink = Sink::to_buffer(AUTO_PREFIX_LEN + 16, false, EolConvert::Auto, Eol::Lf);
        let mut data = vec![b'a'; AUTO_PREFIX_LEN];
        data.push(0x00); // non-text byte
        data.push(b'\r');
        sink.write(&data).unwrap();
        sink.finish().unwrap();
        let out = sink.into_buffer().unwrap();
        // binary detected -> CR left untouched
        assert_eq!(out, data);
    }
}
