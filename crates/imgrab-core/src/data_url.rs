//! Self-contained `data:` URLs: converted images going to the host, and
//! inline page images coming from the observer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use percent_encoding::percent_decode_str;

pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Media type of a `data:` URL that names none (RFC 2397).
pub const DEFAULT_DATA_MIME: &str = "text/plain;charset=US-ASCII";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("not a data: URL")]
    NotDataUrl,
    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

/// Decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Encodes `bytes` as `data:<mime>;base64,<payload>`. An empty mime uses [`FALLBACK_MIME`].
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    let mime = match mime.trim() {
        "" => FALLBACK_MIME,
        m => m,
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

pub fn is_data_url(url: &str) -> bool {
    url.trim_start()
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Decodes a `data:` URL in either form: `;base64` or percent-encoded.
/// A missing media type becomes [`DEFAULT_DATA_MIME`].
pub fn decode(url: &str) -> Result<DataUrl, DataUrlError> {
    let url = url.trim_start();
    if !is_data_url(url) {
        return Err(DataUrlError::NotDataUrl);
    }
    let (meta, payload) = url[5..].split_once(',').ok_or(DataUrlError::NotDataUrl)?;
    let meta = meta.trim();

    let (mime, base64) = match meta.len().checked_sub(7) {
        Some(i) if meta.is_char_boundary(i) && meta[i..].eq_ignore_ascii_case(";base64") => {
            (meta[..i].trim(), true)
        }
        _ => (meta, false),
    };

    let raw: Vec<u8> = percent_decode_str(payload).collect();
    let data = if base64 {
        let compact: Vec<u8> = raw.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| DataUrlError::Payload(e.to_string()))?
    } else {
        raw
    };

    let mime = if mime.is_empty() || mime.starts_with(';') {
        DEFAULT_DATA_MIME.to_string()
    } else {
        mime.to_string()
    };
    Ok(DataUrl { mime, data })
}

/// Bare media type: parameters dropped, lowercased.
pub fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}
