//! CLI Adapter
//!
//! Command-line interface for mintwatch.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    build_notifier, build_providers, build_source_factory, check_config_command, format_pair, format_snapshot,
    inspect_command, run_command, users_to_arm, CliApp, Command, InspectCmd, RunCmd,
};
