//! Toolbox - command-line client for a toolbox server

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde_json::Map;
use std::time::Duration;
use toolbox_auth::google_id_token;
use toolbox_cli::args::parse_json_value;
use toolbox_cli::{init_subscriber, Cli, CliConfig, Commands, ConfigCommands, TelemetryConfig};
use toolbox_core::{CallArgs, LoadOptions, ToolboxClient, ToolboxTool};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Config {
        command: ConfigCommands::Path,
    } = &cli.command
    {
        return run_config_path(&cli);
    }

    let config = CliConfig::load(cli.config.as_deref())?;
    init_subscriber(&TelemetryConfig::from(&config));

    match &cli.command {
        Commands::List { toolset } => run_list(&cli, &config, toolset.as_deref()).await,
        Commands::Describe { tool } => run_describe(&cli, &config, tool).await,
        Commands::Invoke {
            tool,
            args,
            binds,
            tokens,
            google_tokens,
        } => {
            let mut options = LoadOptions::new();
            for (name, raw) in binds {
                options = options.with_bound_param(name.as_str(), parse_json_value(raw));
            }
            for (source, token) in tokens {
                options = options.with_auth_token_getter(source.as_str(), token.as_str());
            }
            let audience = google_audience(&cli, &config);
            for source in google_tokens {
                options = options.with_auth_token_getter(source.as_str(), google_id_token(audience));
            }

            let named: Map<_, _> = args
                .iter()
                .map(|(name, raw)| (name.clone(), parse_json_value(raw)))
                .collect();

            run_invoke(&cli, &config, tool, options, CallArgs::from_named(named)).await
        }
        Commands::Config { command } => run_config(&cli, command, &config),
    }
}

fn google_audience<'a>(cli: &'a Cli, config: &'a CliConfig) -> Option<&'a str> {
    cli.google_audience
        .as_deref()
        .or(config.google_audience.as_deref())
}

fn build_client(cli: &Cli, config: &CliConfig) -> Result<ToolboxClient> {
    let url = cli
        .url
        .as_deref()
        .or(config.url.as_deref())
        .context("No toolbox URL configured. Pass --url, set TOOLBOX_URL, or add `url` to the config file")?;

    let mut builder = ToolboxClient::builder(url)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .headers(config.headers.clone())
        .headers(cli.headers.iter().cloned());

    if let Some(audience) = cli.google_audience.as_deref() {
        builder = builder.header("Authorization", google_id_token(Some(audience)));
    }

    builder.build().context("Failed to create toolbox client")
}

async fn run_list(cli: &Cli, config: &CliConfig, toolset: Option<&str>) -> Result<()> {
    let client = build_client(cli, config)?;
    let result = client.load_toolset(toolset, LoadOptions::new()).await;
    client.close();

    let tools = result?;
    if tools.is_empty() {
        println!("{}", "No tools found.".dimmed());
        return Ok(());
    }

    for tool in &tools {
        let summary = tool.description().lines().next().unwrap_or_default();
        println!("{}  {}", tool.name().cyan().bold(), summary);
    }
    Ok(())
}

async fn run_describe(cli: &Cli, config: &CliConfig, name: &str) -> Result<()> {
    let client = build_client(cli, config)?;
    let result = client.load_tool(name, LoadOptions::new()).await;
    client.close();

    let tool = result?;
    println!("{}", tool.name().cyan().bold());
    println!("{}", tool.doc());
    print_auth_requirements(&tool);
    Ok(())
}

fn print_auth_requirements(tool: &ToolboxTool) {
    let authn = tool.required_authn_params();
    let authz = tool.required_authz_tokens();
    if authn.is_empty() && authz.is_empty() {
        return;
    }

    println!();
    println!("{}", "Authentication:".yellow().bold());
    for (param, sources) in authn {
        println!("    {} <- {}", param, sources.join(" | "));
    }
    if !authz.is_empty() {
        println!("    any of: {}", authz.join(", "));
    }
}

async fn run_invoke(
    cli: &Cli,
    config: &CliConfig,
    name: &str,
    options: LoadOptions,
    args: CallArgs,
) -> Result<()> {
    let client = build_client(cli, config)?;
    let result = load_and_call(&client, name, options, args).await;
    client.close();

    println!("{}", result?);
    Ok(())
}

async fn load_and_call(
    client: &ToolboxClient,
    name: &str,
    options: LoadOptions,
    args: CallArgs,
) -> toolbox_core::Result<String> {
    let tool = client.load_tool(name, options).await?;
    tool.call(args).await
}

fn run_config(cli: &Cli, command: &ConfigCommands, config: &CliConfig) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => run_config_path(cli),
    }
}

fn run_config_path(cli: &Cli) -> Result<()> {
    let path = cli
        .config
        .clone()
        .or_else(CliConfig::default_path)
        .context("Could not determine a configuration directory")?;
    println!("{}", path.display());
    Ok(())
}
