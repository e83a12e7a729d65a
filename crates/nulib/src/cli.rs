//! Argument surface mirroring `nulib2/Main.c`'s option table (`spec.md`
//! §6): one action flag selects the verb, a handful of modifier flags
//! shape it, then the archive pathname and an optional file list follow.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "nulib", about = "Command-line NuFX (ShrinkIt) archiver", version)]
pub struct Cli {
    #[command(flatten)]
    pub action: Action,

    /// `-u`: add new entries and replace existing ones only when newer.
    #[arg(short = 'u', action = clap::ArgAction::SetTrue)]
    pub update: bool,
    /// `-f`: like `-u` but only replaces, never adds new entries.
    #[arg(short = 'f', action = clap::ArgAction::SetTrue)]
    pub freshen: bool,
    /// `-r`: recurse into directories given on the command line.
    #[arg(short = 'r', action = clap::ArgAction::SetTrue)]
    pub recurse: bool,
    /// `-j`: junk paths, storing each file's basename only.
    #[arg(short = 'j', action = clap::ArgAction::SetTrue)]
    pub junk_paths: bool,
    /// `-0`: store added files uncompressed.
    #[arg(short = '0', action = clap::ArgAction::SetTrue)]
    pub store: bool,
    /// `-z`: compress with Deflate (requires a plugin codec); `-zz`: Bzip2.
    #[arg(short = 'z', action = clap::ArgAction::Count)]
    pub compress_level: u8,
    /// `-c`: prompt for (or read from stdin) a comment to attach.
    #[arg(short = 'c', action = clap::ArgAction::SetTrue)]
    pub comment: bool,
    /// `-l`: convert text files' EOLs on extract; `-ll`: convert all files.
    #[arg(short = 'l', action = clap::ArgAction::Count)]
    pub eol_convert_level: u8,
    /// `-s`: overwrite existing output files/entries without asking.
    #[arg(short = 's', action = clap::ArgAction::SetTrue)]
    pub overwrite: bool,
    /// `-k`: add the file as a raw ProDOS disk image thread.
    #[arg(short = 'k', action = clap::ArgAction::SetTrue)]
    pub add_as_disk: bool,
    /// `-e`: preserve host file type metadata; `-ee`: extended preserve
    /// (also encodes/decodes resource-fork and disk-image suffixes).
    #[arg(short = 'e', action = clap::ArgAction::Count)]
    pub preserve_type_level: u8,
    /// `-b`: force Binary II wrapping on output.
    #[arg(short = 'b', action = clap::ArgAction::SetTrue)]
    pub force_binary2: bool,

    /// Archive pathname; `-` means stdin/stdout streaming (`spec.md` §6).
    pub archive: PathBuf,

    /// Files to add/extract/delete; empty selects everything for
    /// extract/list/test.
    pub files: Vec<PathBuf>,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
pub struct Action {
    /// `-a`: add files to an archive, creating it if necessary.
    #[arg(short = 'a')]
    pub add: bool,
    /// `-x`: extract files to the current (or `-j`-junked) directory.
    #[arg(short = 'x')]
    pub extract: bool,
    /// `-p`: extract to stdout, concatenated.
    #[arg(short = 'p')]
    pub extract_pipe: bool,
    /// `-t`: list one name per line.
    #[arg(short = 't')]
    pub list_short: bool,
    /// `-v`: list with size/format/date detail.
    #[arg(short = 'v')]
    pub list_verbose: bool,
    /// `-i`: decode every data thread and report CRC failures.
    #[arg(short = 'i')]
    pub test: bool,
    /// `-d`: delete named entries.
    #[arg(short = 'd')]
    pub delete: bool,
}

impl Cli {
    /// Resolves `-0`/`-z`/`-zz` to a thread format, defaulting to the
    /// archive's configured compression when no override is given.
    /// `-zz` (Deflate/Bzip2) is accepted on the command line but rejected
    /// at the codec registry (`spec.md` §4.D: plugin-only formats).
    pub fn requested_format(&self) -> Option<nufx::ThreadFormat> {
        if self.store {
            Some(nufx::ThreadFormat::Uncompressed)
        } else if self.compress_level >= 2 {
            Some(nufx::ThreadFormat::Bzip2)
        } else if self.compress_level == 1 {
            Some(nufx::ThreadFormat::Deflate)
        } else {
            None
        }
    }

    pub fn eol_mode(&self) -> nufx::EolConvert {
        match self.eol_convert_level {
            0 => nufx::EolConvert::Off,
            1 => nufx::EolConvert::On,
            _ => nufx::EolConvert::Auto,
        }
    }
}
