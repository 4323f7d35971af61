//! `imgrab get` – convert and download one image.

use anyhow::Result;
use imgrab_core::agent::Agent;
use imgrab_core::config::ImgrabConfig;
use imgrab_core::image_ref::{output_filename, ImageReference};
use imgrab_core::message::DownloadRequest;
use std::path::Path;

pub async fn run_get(cfg: &ImgrabConfig, download_dir: &Path, image_url: &str) -> Result<()> {
    let reference = ImageReference::from_url(image_url, &cfg.placeholder_filename);
    let saved_as = output_filename(&reference.filename);
    let request = DownloadRequest::from(reference);

    let agent = Agent::from_config(cfg, download_dir);
    let id = agent.pipeline().process(&request).await?;
    println!(
        "Downloaded {} as {} into {} (download {}).",
        request.image_url,
        saved_as,
        download_dir.display(),
        id
    );
    Ok(())
}
