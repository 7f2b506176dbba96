//! CLI for the fdl fragmented downloader.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use fdl_core::config;
use std::path::PathBuf;

use commands::{run_config, run_get, run_probe};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fdl")]
#[command(about = "fdl: concurrent HTTP byte-range downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL in concurrent byte-range fragments.
    Get(GetArgs),

    /// Show size, range support and validators reported by the server.
    Probe {
        /// Direct HTTP/HTTPS URL.
        url: String,
    },

    /// Print the config file path and effective settings.
    Config,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Output file (default: last path segment of the URL).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Worker threads (default from config, 24 out of the box).
    #[arg(short = 'c', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Fragment size in bytes (default: size / concurrency).
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    /// Per-request timeout in seconds; values below 2 become 5.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra request header, repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Replace the output file if it exists.
    #[arg(long)]
    pub overwrite: bool,
}

/// Parses `Name: value`.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get(args) => run_get(&cfg, args).await?,
            CliCommand::Probe { url } => run_probe(&cfg, &url).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
