//! Command-line interface for convo-forge.
//!
//! Provides commands for processing CSV files, looking up stored documents,
//! and verifying storage access.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands, ProcessArgs, ShowArgs};
