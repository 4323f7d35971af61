//! HTTP transport for the agent: image GET and multipart POST.
//!
//! Uses the curl crate (libcurl). Calls are blocking; the pipeline runs them
//! on tokio's blocking pool.

use std::time::Duration;

/// Response of a completed HTTP exchange (any status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u32,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (unreachable host, refused, reset...).
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error(transparent)]
    Curl(#[from] curl::Error),
    #[error("multipart form: {0}")]
    Form(#[from] curl::FormError),
    #[error("transport task failed: {0}")]
    Task(String),
    /// An inline `data:` image that cannot be read.
    #[error("unreadable data: URL: {0}")]
    DataUrl(#[from] crate::data_url::DataUrlError),
}

pub trait HttpClient: Send + Sync + 'static {
    fn get(&self, url: &str) -> Result<HttpResponse, NetworkError>;

    /// POSTs a `multipart/form-data` body with one file part labelled
    /// `content_type`.
    fn post_multipart(
        &self,
        url: &str,
        field: &str,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<HttpResponse, NetworkError>;
}

/// libcurl-backed client. No transfer timeout is set, so a slow or hung peer
/// stalls only the request using it. A zero connect timeout leaves libcurl's
/// own default in place.
#[derive(Debug, Clone)]
pub struct CurlClient {
    connect_timeout: Duration,
}

impl CurlClient {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn easy(&self, url: &str) -> Result<curl::easy::Easy, NetworkError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        if !self.connect_timeout.is_zero() {
            easy.connect_timeout(self.connect_timeout)?;
        }
        Ok(easy)
    }

    fn perform(mut easy: curl::easy::Easy) -> Result<HttpResponse, NetworkError> {
        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let status = easy.response_code()?;
        let content_type = easy.content_type()?.map(str::to_string);
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Default for CurlClient {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl HttpClient for CurlClient {
    fn get(&self, url: &str) -> Result<HttpResponse, NetworkError> {
        let easy = self.easy(url)?;
        Self::perform(easy)
    }

    fn post_multipart(
        &self,
        url: &str,
        field: &str,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<HttpResponse, NetworkError> {
        let mut easy = self.easy(url)?;
        let mut form = curl::easy::Form::new();
        form.part(field)
            .buffer(filename, data)
            .content_type(content_type)
            .add()?;
        easy.httppost(form)?;
        Self::perform(easy)
    }
}

/// Part content type from the file extension, as a browser would label the blob.
pub fn mime_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webp" => "image/webp",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
