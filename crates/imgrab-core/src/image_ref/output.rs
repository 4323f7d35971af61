//! Name of the converted file.

const SOURCE_SUFFIX: &str = ".webp";
const TARGET_SUFFIX: &str = ".png";

/// Replaces a trailing `.webp` (any case) with `.png`. Other names are returned unchanged.
pub fn output_filename(filename: &str) -> String {
    let cut = filename.len().saturating_sub(SOURCE_SUFFIX.len());
    match filename.get(cut..) {
        Some(tail) if filename.len() >= SOURCE_SUFFIX.len() && tail.eq_ignore_ascii_case(SOURCE_SUFFIX) => {
            format!("{}{}", &filename[..cut], TARGET_SUFFIX)
        }
        _ => filename.to_string(),
    }
}
