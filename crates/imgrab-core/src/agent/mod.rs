//! Conversion-and-download agent.
//!
//! Consumes download requests from the observer channel and runs each one
//! through the [`Pipeline`] as its own task. Requests are independent: no
//! ordering between them, no cancellation, no backpressure.

mod error;
mod http;
mod pipeline;

pub use error::{PipelineError, Stage};
pub use http::{mime_for_filename, CurlClient, HttpClient, HttpResponse, NetworkError};
pub use pipeline::{Pipeline, PipelineState, UPLOAD_FIELD};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::config::ImgrabConfig;
use crate::host::FsDownloadHost;
use crate::message::{DownloadRequest, Message, RequestReceiver};

pub struct Agent {
    pipeline: Arc<Pipeline>,
}

impl Agent {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Agent with the curl transport and a download directory host.
    pub fn from_config(cfg: &ImgrabConfig, download_dir: &Path) -> Self {
        let client = CurlClient::new(Duration::from_secs(cfg.connect_timeout_secs));
        let host = FsDownloadHost::new(download_dir);
        Self::new(Pipeline::new(
            Arc::new(client),
            Arc::new(host),
            cfg.convert_endpoint.clone(),
        ))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Processes one request to completion. The outcome is only logged.
    pub async fn handle_download_request(&self, request: DownloadRequest) {
        self.pipeline.handle(request).await;
    }

    /// Runs until every sender is gone and in-flight requests have finished.
    /// Returns how many requests were processed.
    pub async fn run(&self, mut requests: RequestReceiver) -> usize {
        let mut tasks = JoinSet::new();
        let mut received = 0usize;
        loop {
            tokio::select! {
                msg = requests.recv() => match msg {
                    Some(Message::DownloadImage(request)) => {
                        received += 1;
                        let pipeline = Arc::clone(&self.pipeline);
                        tasks.spawn(async move { pipeline.handle(request).await });
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }
        tracing::debug!(in_flight = tasks.len(), "request channel closed, draining");
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        received
    }
}

fn log_join(joined: Result<PipelineState, tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("download task panicked: {}", e);
    }
}
