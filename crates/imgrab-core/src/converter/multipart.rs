//! Minimal `multipart/form-data` reader: finds one named part in a buffered body.

/// A form part as uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("request is not multipart/form-data")]
    NotMultipart,
    #[error("multipart boundary missing")]
    NoBoundary,
    #[error("malformed multipart body")]
    Malformed,
}

/// Boundary from a `Content-Type: multipart/form-data; boundary=...` value.
pub fn boundary(content_type: &str) -> Result<String, MultipartError> {
    let mut params = content_type.split(';');
    let kind = params.next().unwrap_or_default().trim();
    if !kind.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::NotMultipart);
    }
    params
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::NoBoundary)
}

/// Parses every part of `body`.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<FormPart>, MultipartError> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let next_delimiter = format!("\r\n--{}", boundary).into_bytes();

    let start = find(body, &delimiter).ok_or(MultipartError::Malformed)?;
    let mut rest = &body[start + delimiter.len()..];
    let mut parts = Vec::new();

    loop {
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        rest = rest.strip_prefix(b"\r\n").ok_or(MultipartError::Malformed)?;

        let header_end = find(rest, b"\r\n\r\n").ok_or(MultipartError::Malformed)?;
        let headers = std::str::from_utf8(&rest[..header_end]).map_err(|_| MultipartError::Malformed)?;
        rest = &rest[header_end + 4..];

        let data_end = find(rest, &next_delimiter).ok_or(MultipartError::Malformed)?;
        let data = rest[..data_end].to_vec();
        rest = &rest[data_end + next_delimiter.len()..];

        if let Some(part) = part_from_headers(headers, data) {
            parts.push(part);
        }
    }
}

/// The first part named `field`, if any.
pub fn find_part(body: &[u8], boundary: &str, field: &str) -> Result<Option<FormPart>, MultipartError> {
    Ok(parse(body, boundary)?.into_iter().find(|p| p.name == field))
}

fn part_from_headers(headers: &str, data: Vec<u8>) -> Option<FormPart> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }
    Some(FormPart {
        name: name?,
        filename,
        content_type,
        data,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
