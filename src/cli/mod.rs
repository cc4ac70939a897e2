//! CLI module for the searchsync tool.
//!
//! This module provides the command-line interface for reconciling
//! search-cluster objects.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
