//! Library half of the `nulib` binary: argument parsing, filename
//! preservation encoding, and command implementations, kept separate
//! from `main.rs` so integration tests can call them directly.

pub mod cli;
pub mod commands;
pub mod filename;

pub use cli::{Action, Cli};
pub use commands::{CliError, CliResult};
