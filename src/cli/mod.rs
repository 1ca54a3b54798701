//! CLI subcommand implementations for the portalta binary.

pub mod discover_cmd;
pub mod fetch_cmd;
