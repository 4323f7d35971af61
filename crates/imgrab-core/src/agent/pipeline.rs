//! Fetch → convert → encode → download, one request at a time.
//!
//! Each stage is an async step returning a result; the first failure ends the
//! request. Blocking work (HTTP, base64, file writes) runs on the blocking pool.

use std::fmt;
use std::sync::Arc;

use super::error::{PipelineError, Stage};
use super::http::{mime_for_filename, HttpClient, HttpResponse, NetworkError};
use crate::data_url;
use crate::host::{DownloadHost, DownloadId, DownloadOptions, HostError};
use crate::image_ref::output_filename;
use crate::message::DownloadRequest;

/// Multipart field the conversion service reads the image from.
pub const UPLOAD_FIELD: &str = "file";

/// Where a request is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Converting,
    Encoding,
    Downloading,
    Done(DownloadId),
    Failed { stage: Stage, reason: String },
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Fetching => f.write_str("fetching"),
            PipelineState::Converting => f.write_str("converting"),
            PipelineState::Encoding => f.write_str("encoding"),
            PipelineState::Downloading => f.write_str("downloading"),
            PipelineState::Done(id) => write!(f, "done (download {})", id),
            PipelineState::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
        }
    }
}

pub struct Pipeline {
    client: Arc<dyn HttpClient>,
    host: Arc<dyn DownloadHost>,
    convert_endpoint: String,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn HttpClient>,
        host: Arc<dyn DownloadHost>,
        convert_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            host,
            convert_endpoint: convert_endpoint.into(),
        }
    }

    pub fn convert_endpoint(&self) -> &str {
        &self.convert_endpoint
    }

    /// Runs the request to completion and logs the outcome. Nothing is
    /// reported back to the sender; the final state is returned for callers
    /// that want it.
    pub async fn handle(&self, request: DownloadRequest) -> PipelineState {
        enter(&request.filename, &PipelineState::Idle);
        tracing::info!(filename = %request.filename, url = %request.image_url, "starting conversion and download");
        let state = match self.process(&request).await {
            Ok(id) => {
                tracing::info!(filename = %output_filename(&request.filename), id = %id, "download started");
                PipelineState::Done(id)
            }
            Err(e) => {
                tracing::error!(filename = %request.filename, stage = %e.stage(), "image processing failed: {}", e);
                PipelineState::Failed {
                    stage: e.stage(),
                    reason: e.to_string(),
                }
            }
        };
        tracing::debug!(filename = %request.filename, state = %state, "pipeline finished");
        state
    }

    /// The pipeline proper: returns the host's download id or the first failure.
    pub async fn process(&self, request: &DownloadRequest) -> Result<DownloadId, PipelineError> {
        let filename = request.filename.as_str();

        enter(filename, &PipelineState::Fetching);
        let original = self.fetch(&request.image_url, filename).await?;

        enter(filename, &PipelineState::Converting);
        let converted = self.convert(original, filename).await?;

        enter(filename, &PipelineState::Encoding);
        let url = encode(converted).await?;

        enter(filename, &PipelineState::Downloading);
        self.download(url, output_filename(filename)).await
    }

    /// Image bytes plus the media type to label the upload with. Inline
    /// `data:` images are decoded in place; anything else goes to the client.
    async fn fetch(&self, image_url: &str, filename: &str) -> Result<FetchedImage, PipelineError> {
        if data_url::is_data_url(image_url) {
            let url = image_url.to_string();
            let decoded = on_blocking_pool(Stage::Fetch, move || {
                data_url::decode(&url).map_err(NetworkError::from)
            })
            .await?;
            tracing::debug!(mime = %decoded.mime, bytes = decoded.data.len(), "inline image decoded");
            return Ok(FetchedImage {
                content_type: upload_type(Some(&decoded.mime), filename),
                data: decoded.data,
            });
        }

        let client = Arc::clone(&self.client);
        let url = image_url.to_string();
        let response = on_blocking_pool(Stage::Fetch, move || client.get(&url)).await?;
        if !response.is_success() {
            // The body is still handed to the converter, which rejects what it cannot decode.
            tracing::warn!(url = image_url, status = response.status, "image fetch returned non-success status");
        }
        Ok(FetchedImage {
            content_type: upload_type(response.content_type.as_deref(), filename),
            data: response.body,
        })
    }

    async fn convert(&self, image: FetchedImage, filename: &str) -> Result<HttpResponse, PipelineError> {
        let client = Arc::clone(&self.client);
        let endpoint = self.convert_endpoint.clone();
        let name = filename.to_string();
        let response = on_blocking_pool(Stage::Convert, move || {
            client.post_multipart(&endpoint, UPLOAD_FIELD, &name, &image.content_type, image.data)
        })
        .await?;
        if !response.is_success() {
            return Err(PipelineError::Conversion {
                status: response.status,
            });
        }
        Ok(response)
    }

    async fn download(&self, url: String, filename: String) -> Result<DownloadId, PipelineError> {
        let host = Arc::clone(&self.host);
        let options = DownloadOptions {
            url,
            filename: filename.clone(),
            save_as: false,
        };
        match tokio::task::spawn_blocking(move || host.download(options)).await {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(source)) => Err(PipelineError::Download { filename, source }),
            Err(join) => Err(PipelineError::Download {
                filename,
                source: HostError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    join.to_string(),
                )),
            }),
        }
    }
}

struct FetchedImage {
    data: Vec<u8>,
    content_type: String,
}

/// Media type of the fetched image without parameters, else a guess from
/// the filename.
fn upload_type(fetched: Option<&str>, filename: &str) -> String {
    match fetched.map(data_url::essence) {
        Some(mime) if !mime.is_empty() => mime,
        _ => mime_for_filename(filename).to_string(),
    }
}

fn enter(filename: &str, state: &PipelineState) {
    tracing::debug!(filename, state = %state, "pipeline stage");
}

/// Encodes the converted body as a data URL, labelled with its content type.
async fn encode(converted: HttpResponse) -> Result<String, PipelineError> {
    let mime = converted
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(data_url::FALLBACK_MIME)
        .to_string();
    let body = converted.body;
    tokio::task::spawn_blocking(move || data_url::encode(&mime, &body))
        .await
        .map_err(|e| PipelineError::Encode(e.to_string()))
}

async fn on_blocking_pool<T, F>(stage: Stage, f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, NetworkError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| NetworkError::Task(e.to_string()))
        .and_then(|r| r)
        .map_err(|source| PipelineError::Network { stage, source })
}
