//! Image references and filename derivation.
//!
//! Turns a resolved image URL into the filename a download is requested
//! under, maps it to the name of the converted output, and makes names
//! safe to create on a Linux filesystem.

mod output;
mod path;
mod sanitize;

pub use output::output_filename;
pub use path::{filename_from_url, ExtractionFailure};
pub use sanitize::sanitize_filename;

pub use crate::config::DEFAULT_PLACEHOLDER_FILENAME;

/// An image the user asked to download: where it lives and what to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub image_url: String,
    pub filename: String,
}

impl ImageReference {
    /// Derives the reference for `image_url`. Never fails: if no filename can
    /// be extracted, `placeholder` is used and the failure is logged.
    pub fn from_url(image_url: &str, placeholder: &str) -> Self {
        let filename = match filename_from_url(image_url) {
            Ok(name) => name,
            Err(ExtractionFailure::Empty) => {
                tracing::debug!(url = image_url, "no filename in URL path, using placeholder");
                placeholder.to_string()
            }
            Err(e) => {
                tracing::warn!(url = image_url, "could not extract filename: {}", e);
                placeholder.to_string()
            }
        };
        Self {
            image_url: image_url.to_string(),
            filename,
        }
    }
}
