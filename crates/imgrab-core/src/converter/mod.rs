//! Local conversion service: `POST /convert` with a multipart `file` field,
//! answered with the image re-encoded as PNG.
//!
//! Errors are JSON bodies: 400 when no file was sent, 500 when the image
//! cannot be converted.

mod multipart;
mod transcode;

pub use multipart::{boundary, find_part, parse, FormPart, MultipartError};
pub use transcode::{png_name, to_png, ConvertError};

use anyhow::{Context, Result};
use serde_json::json;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::agent::UPLOAD_FIELD;
use crate::config::ConverterConfig;

pub const CONVERT_PATH: &str = "/convert";

/// Largest request body accepted.
pub const MAX_UPLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Bound service ready to accept requests.
pub struct ConverterServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

impl ConverterServer {
    pub fn bind(addr: &str) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| anyhow::anyhow!("failed to bind conversion service on {}: {}", addr, e))?;
        let addr = server
            .server_addr()
            .to_ip()
            .context("conversion service is not bound to an IP address")?;
        Ok(Self {
            server: Arc::new(server),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Full URL of the convert endpoint on this server.
    pub fn convert_url(&self) -> String {
        format!("http://{}{}", self.addr, CONVERT_PATH)
    }

    /// Request loop (blocking). Each request is handled on its own thread.
    pub fn run(self) {
        tracing::info!(addr = %self.addr, "conversion service listening");
        for request in self.server.incoming_requests() {
            thread::spawn(move || {
                if let Err(e) = handle_request(request) {
                    tracing::warn!("conversion request error: {:#}", e);
                }
            });
        }
    }

    /// Runs the request loop on a background thread.
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }
}

/// Binds the configured address and serves until the process exits.
pub fn serve(cfg: &ConverterConfig) -> Result<()> {
    let server = ConverterServer::bind(&cfg.bind)?;
    server.run();
    Ok(())
}

fn handle_request(mut request: Request) -> Result<()> {
    let path = request.url().split('?').next().unwrap_or_default().to_string();
    if path != CONVERT_PATH {
        return send_json(request, 404, json!({ "error": "Not found." }));
    }
    if *request.method() != Method::Post {
        return send_json(request, 405, json!({ "error": "Method not allowed." }));
    }

    let content_type = header_value(&request, "Content-Type").unwrap_or_default();
    let Ok(boundary) = multipart::boundary(&content_type) else {
        return send_json(request, 400, json!({ "error": "No file was provided." }));
    };

    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_UPLOAD_BYTES + 1)
        .read_to_end(&mut body)
        .context("reading request body")?;
    if body.len() as u64 > MAX_UPLOAD_BYTES {
        return send_json(request, 413, json!({ "error": "File too large." }));
    }

    let part = match multipart::find_part(&body, &boundary, UPLOAD_FIELD) {
        Ok(Some(part)) => part,
        Ok(None) | Err(_) => {
            return send_json(request, 400, json!({ "error": "No file was provided." }));
        }
    };

    let uploaded = part.filename.clone().unwrap_or_default();
    match transcode::to_png(&part.data) {
        Ok(png) => {
            let name = transcode::png_name(&uploaded);
            tracing::info!(file = %uploaded, bytes_in = part.data.len(), bytes_out = png.len(), "converted image");
            let mut response = Response::from_data(png)
                .with_status_code(StatusCode(200))
                .with_header(static_header("Content-Type", "image/png"));
            if let Ok(h) = Header::from_bytes(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", ascii_filename(&name)),
            ) {
                response = response.with_header(h);
            }
            request.respond(response)?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(file = %uploaded, "conversion failed: {}", e);
            send_json(
                request,
                500,
                json!({ "error": "Conversion failed", "details": e.to_string() }),
            )
        }
    }
}

fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

fn send_json(request: Request, status: u16, body: serde_json::Value) -> Result<()> {
    let response = Response::from_string(body.to_string())
        .with_status_code(StatusCode(status))
        .with_header(static_header("Content-Type", "application/json"));
    request.respond(response)?;
    Ok(())
}

fn static_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid ASCII")
}

/// Header-safe rendition of a filename: ASCII only, no quotes.
fn ascii_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect()
}
