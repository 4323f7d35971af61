//! End-to-end runs against a local image server and a live conversion service.

mod common;

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use imgrab_core::agent::{
    Agent, CurlClient, HttpClient, Pipeline, PipelineError, PipelineState, Stage, UPLOAD_FIELD,
};
use imgrab_core::converter::ConverterServer;
use imgrab_core::data_url;
use imgrab_core::dom::{ContainerMarker, Document};
use imgrab_core::host::{DownloadHost, FsDownloadHost};
use imgrab_core::message::{channel, DownloadRequest};
use imgrab_core::observer::PageObserver;
use url::Url;

fn sample_webp() -> Vec<u8> {
    let img = RgbaImage::from_fn(8, 5, |x, y| Rgba([x as u8 * 30, y as u8 * 50, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::WebP).unwrap();
    out.into_inner()
}

fn client() -> CurlClient {
    CurlClient::new(Duration::from_secs(5))
}

fn start_converter() -> String {
    let server = ConverterServer::bind("127.0.0.1:0").unwrap();
    let url = server.convert_url();
    server.spawn();
    url
}

fn pipeline(endpoint: &str, dir: &Path) -> Pipeline {
    let client: Arc<dyn HttpClient> = Arc::new(client());
    let host: Arc<dyn DownloadHost> = Arc::new(FsDownloadHost::new(dir));
    Pipeline::new(client, host, endpoint)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn webp_is_converted_and_saved_as_png() {
    let base = common::image_server::start(sample_webp(), "image/webp");
    let endpoint = start_converter();
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&endpoint, dir.path());

    let request = DownloadRequest {
        image_url: format!("{}img/a.webp", base),
        filename: "a.webp".to_string(),
    };
    let state = p.handle(request).await;
    assert!(matches!(state, PipelineState::Done(_)), "got {state}");

    assert_eq!(files_in(dir.path()), vec!["a.png".to_string()]);
    let saved = std::fs::read(dir.path().join("a.png")).unwrap();
    assert_eq!(image::guess_format(&saved).unwrap(), ImageFormat::Png);
    let decoded = image::load_from_memory(&saved).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_downloads_get_distinct_names() {
    let base = common::image_server::start(sample_webp(), "image/webp");
    let endpoint = start_converter();
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&endpoint, dir.path());

    for _ in 0..2 {
        let request = DownloadRequest {
            image_url: format!("{}a.webp", base),
            filename: "a.webp".to_string(),
        };
        p.process(&request).await.unwrap();
    }
    assert_eq!(files_in(dir.path()), vec!["a (1).png".to_string(), "a.png".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inline_data_image_is_converted_without_a_fetch() {
    let endpoint = start_converter();
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&endpoint, dir.path());

    let request = DownloadRequest {
        image_url: data_url::encode("image/webp", &sample_webp()),
        filename: "downloaded_image".to_string(),
    };
    p.process(&request).await.unwrap();

    assert_eq!(files_in(dir.path()), vec!["downloaded_image".to_string()]);
    let saved = std::fs::read(dir.path().join("downloaded_image")).unwrap();
    assert_eq!(image::guess_format(&saved).unwrap(), ImageFormat::Png);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undecodable_image_is_not_downloaded() {
    let base = common::image_server::start(b"<html>not an image</html>".to_vec(), "text/html");
    let endpoint = start_converter();
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&endpoint, dir.path());

    let request = DownloadRequest {
        image_url: format!("{}broken.webp", base),
        filename: "broken.webp".to_string(),
    };
    let err = p.process(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::Conversion { status: 500 }), "got {err:?}");
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn converter_down_is_a_network_failure() {
    let base = common::image_server::start(sample_webp(), "image/webp");
    let endpoint = common::image_server::dead_url("convert");
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(&endpoint, dir.path());

    let request = DownloadRequest {
        image_url: format!("{}a.webp", base),
        filename: "a.webp".to_string(),
    };
    let err = p.process(&request).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Convert);
    assert!(matches!(err, PipelineError::Network { .. }));
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn converter_rejects_upload_without_file_field() {
    let endpoint = start_converter();
    let client = client();

    let resp = client
        .post_multipart(&endpoint, "attachment", "a.webp", "image/webp", sample_webp())
        .unwrap();
    assert_eq!(resp.status, 400);
    let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body["error"], "No file was provided.");

    let resp = client
        .post_multipart(&endpoint, UPLOAD_FIELD, "a.webp", "image/webp", sample_webp())
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type.as_deref(), Some("image/png"));
}

#[test]
fn converter_reports_conversion_failure_details() {
    let endpoint = start_converter();
    let resp = client()
        .post_multipart(&endpoint, UPLOAD_FIELD, "x.webp", "image/webp", b"garbage".to_vec())
        .unwrap();
    assert_eq!(resp.status, 500);
    let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body["error"], "Conversion failed");
    assert!(body["details"].as_str().is_some_and(|d| !d.is_empty()));
}

#[test]
fn unknown_path_is_not_found() {
    let endpoint = start_converter();
    let other = endpoint.replace("/convert", "/other");
    let resp = client().get(&other).unwrap();
    assert_eq!(resp.status, 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn click_in_page_ends_with_png_on_disk() {
    let base = common::image_server::start(sample_webp(), "image/webp");
    let endpoint = start_converter();
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = channel();

    {
        let mut doc = Document::new(Url::parse(&base).unwrap());
        let mut observer = PageObserver::new(tx, ContainerMarker::default(), "downloaded_image");
        observer.start(&mut doc);

        let div = doc.create_element("div");
        doc.add_class(div, "group/image").unwrap();
        let img = doc.create_element("img");
        doc.set_attribute(img, "src", "/pics/cat%20photo.webp").unwrap();
        let button = doc.create_element("button");
        doc.append_child(div, img).unwrap();
        doc.append_child(div, button).unwrap();
        let body = doc.body();
        doc.append_child(body, div).unwrap();
        assert_eq!(observer.process_mutations(&mut doc), 1);

        let ev = doc.click(button).unwrap();
        assert!(ev.default_prevented());
    }

    let agent = Agent::new(pipeline(&endpoint, dir.path()));
    assert_eq!(agent.run(rx).await, 1);
    assert_eq!(files_in(dir.path()), vec!["cat photo.png".to_string()]);
}
