//! Toolbox CLI
//!
//! Provides the `toolbox` binary:
//! - `list`: tools in a toolset
//! - `describe`: signature and auth requirements of one tool
//! - `invoke`: call a tool with named arguments

pub mod args;
pub mod commands;
pub mod config;
pub mod telemetry;

pub use commands::{Cli, Commands, ConfigCommands};
pub use config::CliConfig;
pub use telemetry::{init_subscriber, TelemetryConfig};
