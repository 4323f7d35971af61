//! CLI for imgrab.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use imgrab_core::config::{self, ImgrabConfig};
use std::path::PathBuf;

use commands::{run_agent, run_get, run_serve};

/// Top-level CLI for imgrab.
#[derive(Debug, Parser)]
#[command(name = "imgrab")]
#[command(about = "imgrab: intercept image clicks, convert webp to png, download", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the download agent on JSON-line `downloadImage` messages from stdin.
    Agent {
        /// Save downloads here (default: config `download_dir`, else current directory).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// Convert and download a single image.
    Get {
        /// Absolute URL of the image.
        image_url: String,
        /// Save the download here (default: config `download_dir`, else current directory).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// Run the local conversion service.
    Serve {
        /// Address to listen on (default: config `[converter] bind`).
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Agent { download_dir } => {
                let dir = resolve_download_dir(download_dir, &cfg)?;
                run_agent(&cfg, &dir).await?;
            }
            CliCommand::Get {
                image_url,
                download_dir,
            } => {
                let dir = resolve_download_dir(download_dir, &cfg)?;
                run_get(&cfg, &dir, &image_url).await?;
            }
            CliCommand::Serve { bind } => {
                let mut converter = cfg.converter.clone();
                if let Some(bind) = bind {
                    converter.bind = bind;
                }
                run_serve(converter).await?;
            }
        }

        Ok(())
    }
}

/// `--download-dir` wins over the config value; the current directory is the fallback.
fn resolve_download_dir(flag: Option<PathBuf>, cfg: &ImgrabConfig) -> Result<PathBuf> {
    match flag.or_else(|| cfg.download_dir.clone()) {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}
