//! Command-line interface for toolbox.
//!
//! Provides the reader commands (explain, find-bugs) and the editor commands
//! (do, add-comments, refactor, bump-deps).

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
