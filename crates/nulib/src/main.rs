use std::process::ExitCode;

use clap::Parser;
use nulib::cli::Cli;
use nulib::commands;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("nulib: {err}");
            ExitCode::from(match &err {
                commands::CliError::Nufx(nufx::Error::RecNameNotFound(_)) => 2,
                _ => 1,
            })
        }
    }
}

fn run(cli: &Cli) -> commands::CliResult<()> {
    let format = cli.requested_format().unwrap_or(nufx::ThreadFormat::HuffmanSQ);

    if cli.action.add {
        let added = commands::add(&cli.archive, &cli.files, format)?;
        for name in added {
            println!("adding: {name}");
        }
    } else if cli.action.extract {
        let dest = std::env::current_dir()?;
        let written = commands::extract(&cli.archive, Some(&dest), cli.eol_mode())?;
        for path in written {
            println!("extracted: {}", path.display());
        }
    } else if cli.action.extract_pipe {
        commands::extract(&cli.archive, None, cli.eol_mode())?;
    } else if cli.action.list_short {
        for name in commands::list_short(&cli.archive)? {
            println!("{name}");
        }
    } else if cli.action.list_verbose {
        for entry in commands::list_verbose(&cli.archive)? {
            println!(
                "{:<32} {:>10} {:>10} {:?}",
                entry.name, entry.uncompressed_len, entry.compressed_len, entry.format
            );
        }
    } else if cli.action.test {
        let report = commands::test_archive(&cli.archive)?;
        for name in &report.passed {
            println!("  ok: {name}");
        }
        for (name, err) in &report.failed {
            println!("FAIL: {name}: {err}");
        }
        if !report.all_ok() {
            return Err(commands::CliError::Nufx(nufx::Error::BadData));
        }
    } else if cli.action.delete {
        let deleted = commands::delete(&cli.archive, &cli.files.iter().map(path_to_name).collect::<Vec<_>>())?;
        for name in deleted {
            println!("deleted: {name}");
        }
    }

    Ok(())
}

fn path_to_name(p: &std::path::PathBuf) -> String {
    p.to_string_lossy().into_owned()
}
