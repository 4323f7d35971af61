//! One-way messages from the page observer to the download agent.
//!
//! Wire format is JSON, e.g.
//! `{"action":"downloadImage","imageUrl":"https://x/a.webp","filename":"a.webp"}`.
//! Sending never waits and never gets an acknowledgment.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::image_ref::ImageReference;

/// Payload of a `downloadImage` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub image_url: String,
    pub filename: String,
}

impl From<ImageReference> for DownloadRequest {
    fn from(r: ImageReference) -> Self {
        Self {
            image_url: r.image_url,
            filename: r.filename,
        }
    }
}

/// Messages understood by the agent, discriminated by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Message {
    #[serde(rename = "downloadImage")]
    DownloadImage(DownloadRequest),
}

impl Message {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Creates the unbounded request channel between observer and agent.
pub fn channel() -> (RequestSender, RequestReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RequestSender(tx), RequestReceiver(rx))
}

/// Fire-and-forget sending half. Cheap to clone into listeners.
#[derive(Debug, Clone)]
pub struct RequestSender(mpsc::UnboundedSender<Message>);

impl RequestSender {
    /// Enqueues `request`. A closed channel is logged and otherwise ignored.
    pub fn send(&self, request: DownloadRequest) {
        let filename = request.filename.clone();
        if self.0.send(Message::DownloadImage(request)).is_err() {
            tracing::warn!(filename = %filename, "download message dropped: agent is gone");
        } else {
            tracing::debug!(filename = %filename, "download message sent");
        }
    }
}

#[derive(Debug)]
pub struct RequestReceiver(mpsc::UnboundedReceiver<Message>);

impl RequestReceiver {
    /// Next message, or None once every sender is dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Message> {
        self.0.recv().await
    }

    /// Non-blocking variant; None when the queue is currently empty.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.0.try_recv().ok()
    }
}
