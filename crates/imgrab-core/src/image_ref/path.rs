//! Filename extraction from an image URL path.

use percent_encoding::percent_decode_str;

/// Why no filename could be taken from a URL.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("URL has no hierarchical path")]
    NoPath,
    #[error("last path segment is not valid UTF-8 once decoded")]
    InvalidEncoding,
    #[error("last path segment is empty")]
    Empty,
}

/// Takes the last path segment of `url`, percent-decodes it and strips
/// anything from a `?` onwards (a decoded `%3F` included).
pub fn filename_from_url(url: &str) -> Result<String, ExtractionFailure> {
    let parsed = url::Url::parse(url)?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .ok_or(ExtractionFailure::NoPath)?;

    let decoded = percent_decode_str(segment)
        .decode_utf8()
        .map_err(|_| ExtractionFailure::InvalidEncoding)?;
    let name = decoded.split('?').next().unwrap_or_default();
    if name.is_empty() {
        return Err(ExtractionFailure::Empty);
    }
    Ok(name.to_string())
}
