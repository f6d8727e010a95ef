//! CLI command implementations for prometheus-cardinality-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `config`: Configuration file generation
//! - `test`: One-shot status fetch against the configured instances

pub mod config;
pub mod test;

// Re-export command functions
pub use config::command_config;
pub use test::command_test;
