//! `imgrab serve` – run the local conversion service.

use anyhow::{Context, Result};
use imgrab_core::config::ConverterConfig;
use imgrab_core::converter;

pub async fn run_serve(cfg: ConverterConfig) -> Result<()> {
    println!("Conversion service on http://{}{}", cfg.bind, converter::CONVERT_PATH);
    tokio::task::spawn_blocking(move || converter::serve(&cfg))
        .await
        .context("conversion service thread failed")??;
    Ok(())
}
