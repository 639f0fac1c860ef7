//! Shodan CLI - Command-line tool for the Shodan API
//!
//! Account and lookup commands plus live banner streaming.

mod commands;
mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shodan_client::{HostOptions, SearchOptions, ShodanClient, API_KEY_ENV};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::alert::AlertCommand;
use crate::commands::stream::StreamArgs;
use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "shodan-cli")]
#[command(author, version, about = "Shodan API CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// API key
    #[arg(short, long, env = API_KEY_ENV, hide_env_values = true)]
    key: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "SHODAN_CONFIG")]
    config: Option<PathBuf>,

    /// Output format [default: table]
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show plan and credits for the API key
    Info,

    /// Show the account linked to the API key
    Account,

    /// Show your public IP address
    Myip,

    /// Show the HTTP headers your client sends
    Headers,

    /// List the ports the crawlers look for
    Ports,

    /// List the protocols available for scanning
    Protocols,

    /// Resolve hostnames to IP addresses
    Resolve {
        /// Hostname(s) to resolve
        #[arg(required = true)]
        hosts: Vec<String>,
    },

    /// Look up hostnames for IP addresses
    Reverse {
        /// IP address(es) to look up
        #[arg(required = true)]
        ips: Vec<IpAddr>,
    },

    /// Manage network alerts
    Alert {
        #[command(subcommand)]
        command: AlertCommand,
    },

    /// Show all services found on an IP
    Host {
        /// IP address to look up
        ip: IpAddr,

        /// Include historical banners
        #[arg(long)]
        history: bool,

        /// Only ports and general host information
        #[arg(long)]
        minify: bool,
    },

    /// Search the banner database
    Search {
        /// Search query, e.g. "apache country:DE"
        #[arg(required = true)]
        query: Vec<String>,

        /// Facets to summarize, e.g. country:10,port
        #[arg(long)]
        facets: Option<String>,

        /// Result page, starting at 1
        #[arg(long)]
        page: Option<u32>,
    },

    /// Count search results without returning them
    Count {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,

        /// Facets to summarize, e.g. country:10,port
        #[arg(long)]
        facets: Option<String>,
    },

    /// Stream banners in real time
    Stream(StreamArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        cli.key.as_deref(),
        cli.output.map(OutputFormat::as_str),
        cli.no_color,
    );
    tracing::debug!(
        base_url = %merged.client.base_url,
        stream_base_url = %merged.client.stream_base_url,
        output = %merged.output,
        "Configuration loaded"
    );

    // Create output context
    let ctx = OutputContext::new(
        OutputFormat::from_name(&merged.output),
        merged.no_color,
        cli.quiet,
    );

    let client = create_client(merged)?;

    // Execute command
    match &cli.command {
        Commands::Info => commands::info(&client, &ctx).await?,
        Commands::Account => commands::account(&client, &ctx).await?,
        Commands::Myip => commands::myip(&client, &ctx).await?,
        Commands::Headers => commands::headers(&client, &ctx).await?,
        Commands::Ports => commands::ports(&client, &ctx).await?,
        Commands::Protocols => commands::protocols(&client, &ctx).await?,
        Commands::Resolve { hosts } => commands::resolve(&client, hosts, &ctx).await?,
        Commands::Reverse { ips } => commands::reverse(&client, ips, &ctx).await?,
        Commands::Alert { command } => commands::alert(&client, command, &ctx).await?,
        Commands::Host {
            ip,
            history,
            minify,
        } => {
            let options = HostOptions {
                history: *history,
                minify: *minify,
            };
            commands::host(&client, *ip, options, &ctx).await?
        }
        Commands::Search {
            query,
            facets,
            page,
        } => {
            let options = SearchOptions {
                facets: facets.clone(),
                page: *page,
                ..SearchOptions::new(query.join(" "))
            };
            commands::search(&client, &options, &ctx).await?
        }
        Commands::Count { query, facets } => {
            let options = SearchOptions {
                facets: facets.clone(),
                ..SearchOptions::new(query.join(" "))
            };
            commands::count(&client, &options, &ctx).await?
        }
        Commands::Stream(args) => commands::stream(&client, args, &ctx).await?,
    }

    Ok(())
}

/// Create a Shodan client from the merged configuration
fn create_client(merged: MergedConfig) -> Result<ShodanClient> {
    if merged.client.api_key.trim().is_empty() {
        bail!(
            "No API key: pass --key, set {} or add api_key to {}",
            API_KEY_ENV,
            Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".to_string())
        );
    }
    ShodanClient::with_config(merged.client).context("Failed to create Shodan client")
}
