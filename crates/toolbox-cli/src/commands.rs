//! CLI commands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::args::parse_key_value;

/// Toolbox - list, describe and invoke remote tools
#[derive(Parser, Debug)]
#[command(name = "toolbox")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the toolbox server (falls back to the config file)
    #[arg(long, env = "TOOLBOX_URL", global = true)]
    pub url: Option<String>,

    /// Extra request header, repeatable (NAME=VALUE)
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_key_value, global = true)]
    pub headers: Vec<(String, String)>,

    /// Send a Google ID token for this audience as the Authorization header
    #[arg(long, value_name = "AUDIENCE", global = true)]
    pub google_audience: Option<String>,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tools of a toolset
    List {
        /// Toolset name (default toolset if omitted)
        #[arg(long)]
        toolset: Option<String>,
    },

    /// Show a tool's arguments and auth requirements
    Describe {
        /// Tool name
        tool: String,
    },

    /// Invoke a tool
    Invoke {
        /// Tool name
        tool: String,

        /// Argument, repeatable (KEY=JSON, plain strings allowed)
        #[arg(long = "arg", value_name = "KEY=JSON", value_parser = parse_key_value)]
        args: Vec<(String, String)>,

        /// Bind a parameter at load time, repeatable (KEY=JSON)
        #[arg(long = "bind", value_name = "KEY=JSON", value_parser = parse_key_value)]
        binds: Vec<(String, String)>,

        /// Static token for an auth source, repeatable (SOURCE=TOKEN)
        #[arg(long = "token", value_name = "SOURCE=TOKEN", value_parser = parse_key_value)]
        tokens: Vec<(String, String)>,

        /// Auth source to satisfy with a Google ID token, repeatable
        #[arg(long = "google-token", value_name = "SOURCE")]
        google_tokens: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_invoke() {
        let cli = Cli::try_parse_from([
            "toolbox",
            "--url",
            "http://localhost:5000",
            "invoke",
            "weather",
            "--arg",
            "city=Boston",
            "--bind",
            "limit=10",
            "--token",
            "cloud-auth=abc",
            "--google-token",
            "google",
        ])
        .unwrap();

        assert_eq!(cli.url.as_deref(), Some("http://localhost:5000"));
        match cli.command {
            Commands::Invoke {
                tool,
                args,
                binds,
                tokens,
                google_tokens,
            } => {
                assert_eq!(tool, "weather");
                assert_eq!(args, [("city".to_string(), "Boston".to_string())]);
                assert_eq!(binds, [("limit".to_string(), "10".to_string())]);
                assert_eq!(tokens, [("cloud-auth".to_string(), "abc".to_string())]);
                assert_eq!(google_tokens, ["google"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_header() {
        let result = Cli::try_parse_from(["toolbox", "--header", "oops", "list"]);
        assert!(result.is_err());
    }
}
