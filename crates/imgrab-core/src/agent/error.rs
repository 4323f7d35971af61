//! Pipeline stages and failures.

use std::fmt;

use super::http::NetworkError;
use crate::host::HostError;

/// A fallible step of the download pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Convert,
    Encode,
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetch => "fetch",
            Stage::Convert => "convert",
            Stage::Encode => "encode",
            Stage::Download => "download",
        };
        f.write_str(s)
    }
}

/// Why a download request did not produce a file. Confined to one request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A request at `stage` got no response.
    #[error("network failure during {stage}: {source}")]
    Network {
        stage: Stage,
        #[source]
        source: NetworkError,
    },
    /// The conversion service answered with a non-success status.
    #[error("image conversion failed (HTTP {status})")]
    Conversion { status: u32 },
    #[error("encoding the converted image failed: {0}")]
    Encode(String),
    /// The host refused or failed to save the file.
    #[error("download of {filename} failed: {source}")]
    Download {
        filename: String,
        #[source]
        source: HostError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Network { stage, .. } => *stage,
            PipelineError::Conversion { .. } => Stage::Convert,
            PipelineError::Encode(_) => Stage::Encode,
            PipelineError::Download { .. } => Stage::Download,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_stage_and_status() {
        let e = PipelineError::Conversion { status: 500 };
        assert_eq!(e.to_string(), "image conversion failed (HTTP 500)");
        assert_eq!(e.stage(), Stage::Convert);

        let e = PipelineError::Network {
            stage: Stage::Fetch,
            source: NetworkError::Task("cancelled".into()),
        };
        assert_eq!(
            e.to_string(),
            "network failure during fetch: transport task failed: cancelled"
        );
        assert_eq!(e.stage(), Stage::Fetch);
    }
}
