//! Smoke tests for the `Cli` argument surface: just parsing, no process
//! spawn, matching `spec.md` §6's table of actions/modifiers.

use clap::Parser;
use nulib::cli::Cli;

#[test]
fn parses_add_with_store_modifier() {
    let cli = Cli::parse_from(["nulib", "-a", "-0", "archive.shk", "file.txt"]);
    assert!(cli.action.add);
    assert!(cli.store);
    assert_eq!(cli.archive.to_str().unwrap(), "archive.shk");
    assert_eq!(cli.files.len(), 1);
}

#[test]
fn parses_double_l_as_convert_all() {
    let cli = Cli::parse_from(["nulib", "-x", "-l", "-l", "archive.shk"]);
    assert!(cli.action.extract);
    assert_eq!(cli.eol_convert_level, 2);
    assert_eq!(cli.eol_mode(), nufx::EolConvert::Auto);
}

#[test]
fn rejects_two_actions_at_once() {
    let result = Cli::try_parse_from(["nulib", "-a", "-x", "archive.shk"]);
    assert!(result.is_err());
}

#[test]
fn list_short_action_parses() {
    let cli = Cli::parse_from(["nulib", "-t", "archive.shk"]);
    assert!(cli.action.list_short);
    assert!(cli.files.is_empty());
}
