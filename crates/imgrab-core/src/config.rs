use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::dom::ContainerMarker;

/// Endpoint of the local conversion service.
pub const DEFAULT_CONVERT_ENDPOINT: &str = "http://localhost:5000/convert";

/// Filename used when nothing usable can be derived from an image URL.
pub const DEFAULT_PLACEHOLDER_FILENAME: &str = "downloaded_image";

/// Conversion service settings (optional `[converter]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Address the conversion service binds to.
    pub bind: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/imgrab/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImgrabConfig {
    /// URL the agent POSTs images to for conversion.
    pub convert_endpoint: String,
    /// Directory downloads are saved into. None = current directory at the CLI.
    pub download_dir: Option<PathBuf>,
    /// Structural marker identifying image containers on a page.
    pub container_marker: ContainerMarker,
    /// Fallback filename when URL extraction yields nothing.
    pub placeholder_filename: String,
    /// Connect timeout for the HTTP client in seconds; 0 keeps libcurl's default.
    /// No total transfer timeout is applied.
    pub connect_timeout_secs: u64,
    pub converter: ConverterConfig,
}

impl Default for ImgrabConfig {
    fn default() -> Self {
        Self {
            convert_endpoint: DEFAULT_CONVERT_ENDPOINT.to_string(),
            download_dir: None,
            container_marker: ContainerMarker::default(),
            placeholder_filename: DEFAULT_PLACEHOLDER_FILENAME.to_string(),
            connect_timeout_secs: 0,
            converter: ConverterConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("imgrab")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ImgrabConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ImgrabConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ImgrabConfig = toml::from_str(&data)?;
    Ok(cfg)
}
