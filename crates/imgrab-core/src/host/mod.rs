//! Host download facility: takes a data URL and a filename and saves the file.
//!
//! [`DownloadHost`] is the seam the agent talks to; [`FsDownloadHost`] is the
//! implementation that writes into a download directory.

mod fs;

pub use fs::{temp_path, FsDownloadHost};

use crate::data_url::DataUrlError;
use std::fmt;

/// What to download and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub url: String,
    pub filename: String,
    /// Ask the user where to save. The agent always passes false.
    pub save_as: bool,
}

/// Identifier the host assigns to a started download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadId(pub u64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the host refused or failed to save a download.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("unsupported download URL: {0}")]
    Url(#[from] DataUrlError),
    #[error("save-as prompt is not available")]
    SaveAsUnsupported,
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub trait DownloadHost: Send + Sync + 'static {
    /// Starts a download. Blocking; the agent calls it from the blocking pool.
    fn download(&self, options: DownloadOptions) -> Result<DownloadId, HostError>;
}
