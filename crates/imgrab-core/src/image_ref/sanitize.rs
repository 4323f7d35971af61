//! Filesystem-safe download names.

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Makes `name` safe to create inside a download directory.
///
/// Path separators, NUL and control characters become `_`, leading dots and
/// surrounding whitespace are dropped, and the result is cut to NAME_MAX
/// bytes keeping the extension. Returns None when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.').trim_end();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        return None;
    }
    Some(truncate_keeping_extension(trimmed))
}

fn truncate_keeping_extension(name: &str) -> String {
    if name.len() <= NAME_MAX {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(i) if name.len() - i <= 16 => name.split_at(i),
        _ => (name, ""),
    };
    let mut take = NAME_MAX - ext.len();
    while take > 0 && !stem.is_char_boundary(take) {
        take -= 1;
    }
    format!("{}{}", &stem[..take], ext)
}
