use super::*;
use crate::dom::ContainerMarker;
use crate::message::{channel, Message, RequestReceiver};
use std::cell::Cell;
use std::rc::Rc;
use url::Url;

fn setup() -> (Document, PageObserver, RequestReceiver) {
    let doc = Document::new(Url::parse("https://chat.example.com/c/123").unwrap());
    let (tx, rx) = channel();
    let observer = PageObserver::new(tx, ContainerMarker::default(), "downloaded_image");
    (doc, observer, rx)
}

/// Builds `div.group/image > img[src]` plus an optional `button`, detached.
fn container(doc: &mut Document, src: Option<&str>, with_button: bool) -> (NodeId, NodeId, Option<NodeId>) {
    let div = doc.create_element("div");
    doc.add_class(div, "group/image").unwrap();
    let img = doc.create_element("img");
    if let Some(src) = src {
        doc.set_attribute(img, "src", src).unwrap();
    }
    doc.append_child(div, img).unwrap();
    let button = with_button.then(|| {
        let b = doc.create_element("button");
        doc.append_child(div, b).unwrap();
        b
    });
    (div, img, button)
}

fn drain(rx: &mut RequestReceiver) -> Vec<DownloadRequest> {
    let mut out = Vec::new();
    while let Some(Message::DownloadImage(req)) = rx.try_recv() {
        out.push(req);
    }
    out
}

#[test]
fn button_click_is_taken_over() {
    let (mut doc, mut obs, mut rx) = setup();
    let (div, _img, button) = container(&mut doc, Some("https://cdn.example.com/foo/bar.webp?x=1"), true);
    let body = doc.body();
    doc.append_child(body, div).unwrap();

    let page_lens_opened = Rc::new(Cell::new(false));
    let flag = Rc::clone(&page_lens_opened);
    doc.add_event_listener(body, false, move |_| flag.set(true)).unwrap();

    assert_eq!(obs.start(&mut doc), 1);
    let ev = doc.click(button.unwrap()).unwrap();

    assert!(ev.default_prevented());
    assert!(!page_lens_opened.get(), "page handler must not see the click");
    assert_eq!(
        drain(&mut rx),
        vec![DownloadRequest {
            image_url: "https://cdn.example.com/foo/bar.webp?x=1".to_string(),
            filename: "bar.webp".to_string(),
        }]
    );
}

#[test]
fn with_button_image_click_is_left_alone() {
    let (mut doc, mut obs, mut rx) = setup();
    let (div, img, _button) = container(&mut doc, Some("/img/a.webp"), true);
    let body = doc.body();
    doc.append_child(body, div).unwrap();
    obs.start(&mut doc);

    let ev = doc.click(img).unwrap();
    assert!(!ev.default_prevented());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn without_button_image_and_container_clicks_emit() {
    let (mut doc, mut obs, mut rx) = setup();
    let (div, img, _) = container(&mut doc, Some("/img/a.webp"), false);
    let caption = doc.create_element("span");
    doc.append_child(div, caption).unwrap();
    let body = doc.body();
    doc.append_child(body, div).unwrap();
    obs.start(&mut doc);

    assert!(doc.click(img).unwrap().default_prevented());
    assert_eq!(drain(&mut rx).len(), 1);

    assert!(doc.click(div).unwrap().default_prevented());
    let reqs = drain(&mut rx);
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].image_url, "https://chat.example.com/img/a.webp");
    assert_eq!(reqs[0].filename, "a.webp");

    let ev = doc.click(caption).unwrap();
    assert!(!ev.default_prevented());
    assert!(drain(&mut rx).is_empty(), "unrelated descendant emits nothing");
}

#[test]
fn attach_twice_adds_one_listener() {
    let (mut doc, mut obs, mut rx) = setup();
    let (div, _img, button) = container(&mut doc, Some("https://x/a.webp"), true);
    let button = button.unwrap();
    let body = doc.body();
    doc.append_child(body, div).unwrap();

    assert!(obs.attach_interception(&mut doc, div));
    assert!(!obs.attach_interception(&mut doc, div));
    assert_eq!(doc.listener_count(button), 1);
    assert!(obs.is_instrumented(div));

    doc.click(button).unwrap();
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn container_without_src_stays_unmarked_until_ready() {
    let (mut doc, mut obs, _rx) = setup();
    let (div, img, _) = container(&mut doc, None, false);
    let body = doc.body();
    doc.append_child(body, div).unwrap();

    assert!(!obs.attach_interception(&mut doc, div));
    assert!(!obs.is_instrumented(div));

    doc.set_attribute(img, "src", "https://x/late.webp").unwrap();
    assert!(obs.attach_interception(&mut doc, div));
}

#[test]
fn unparseable_src_uses_placeholder() {
    let (mut doc, mut obs, mut rx) = setup();
    let (div, img, _) = container(&mut doc, Some("https://cdn.example.com/gallery/"), false);
    let body = doc.body();
    doc.append_child(body, div).unwrap();
    obs.start(&mut doc);

    doc.click(img).unwrap();
    let reqs = drain(&mut rx);
    assert_eq!(reqs[0].filename, "downloaded_image");
}

#[test]
fn dynamically_inserted_containers_are_instrumented_once() {
    let (mut doc, mut obs, mut rx) = setup();
    assert_eq!(obs.start(&mut doc), 0);

    // A lazily loaded feed chunk with two containers.
    let chunk = doc.create_element("section");
    let (a, _, a_btn) = container(&mut doc, Some("https://x/one.webp"), true);
    let (b, b_img, _) = container(&mut doc, Some("https://x/two.WEBP"), false);
    doc.append_child(chunk, a).unwrap();
    doc.append_child(chunk, b).unwrap();
    let body = doc.body();
    doc.append_child(body, chunk).unwrap();

    assert_eq!(obs.process_mutations(&mut doc), 2);
    // Overlapping observation of the same subtree attaches nothing new.
    assert_eq!(obs.scan_and_attach(&mut doc, chunk), 0);
    assert_eq!(obs.scan_and_attach(&mut doc, a), 0);
    assert_eq!(obs.process_mutations(&mut doc), 0);

    doc.click(a_btn.unwrap()).unwrap();
    doc.click(b_img).unwrap();
    let names: Vec<String> = drain(&mut rx).into_iter().map(|r| r.filename).collect();
    assert_eq!(names, vec!["one.webp", "two.WEBP"]);
}

#[test]
fn container_added_directly_is_checked_itself() {
    let (mut doc, mut obs, _rx) = setup();
    obs.start(&mut doc);
    let (div, _, _) = container(&mut doc, Some("https://x/a.webp"), false);
    let body = doc.body();
    doc.append_child(body, div).unwrap();
    assert_eq!(obs.process_mutations(&mut doc), 1);
    assert!(obs.is_instrumented(div));
}

#[test]
fn removed_containers_leave_the_registry() {
    let (mut doc, mut obs, _rx) = setup();
    let wrapper = doc.create_element("div");
    let (a, _, _) = container(&mut doc, Some("https://x/a.webp"), false);
    let (b, _, _) = container(&mut doc, Some("https://x/b.webp"), true);
    doc.append_child(wrapper, a).unwrap();
    doc.append_child(wrapper, b).unwrap();
    let body = doc.body();
    doc.append_child(body, wrapper).unwrap();
    assert_eq!(obs.start(&mut doc), 2);
    assert_eq!(obs.instrumented_count(), 2);

    doc.remove(wrapper).unwrap();
    obs.process_mutations(&mut doc);
    assert_eq!(obs.instrumented_count(), 0);
    assert!(!obs.is_instrumented(a));
    assert!(!obs.is_instrumented(b));
}

#[test]
fn detached_container_is_not_instrumented() {
    let (mut doc, mut obs, _rx) = setup();
    obs.start(&mut doc);
    let (div, _, _) = container(&mut doc, Some("https://x/a.webp"), true);

    assert!(!obs.attach_interception(&mut doc, div));
    assert_eq!(obs.instrumented_count(), 0);

    doc.remove(div).unwrap();
    obs.process_mutations(&mut doc);
    assert_eq!(obs.instrumented_count(), 0);

    let (div, _, _) = container(&mut doc, Some("https://x/b.webp"), true);
    let body = doc.body();
    doc.append_child(body, div).unwrap();
    assert!(obs.attach_interception(&mut doc, div));
    assert_eq!(obs.instrumented_count(), 1);
}

#[test]
fn added_then_removed_in_one_batch() {
    let (mut doc, mut obs, _rx) = setup();
    obs.start(&mut doc);
    let (div, _, _) = container(&mut doc, Some("https://x/a.webp"), false);
    let body = doc.body();
    doc.append_child(body, div).unwrap();
    doc.remove(div).unwrap();
    assert_eq!(obs.process_mutations(&mut doc), 0);
    assert_eq!(obs.instrumented_count(), 0);
}

#[test]
fn custom_marker_from_config() {
    let mut cfg = ImgrabConfig::default();
    cfg.container_marker = ContainerMarker::new("figure", "shot");
    let (tx, mut rx) = channel();
    let mut obs = PageObserver::from_config(&cfg, tx);
    let mut doc = Document::new(Url::parse("https://x/").unwrap());

    let fig = doc.create_element("figure");
    doc.add_class(fig, "shot").unwrap();
    let img = doc.create_element("img");
    doc.set_attribute(img, "src", "p.webp").unwrap();
    doc.append_child(fig, img).unwrap();
    let (div, _, _) = container(&mut doc, Some("q.webp"), false);
    let body = doc.body();
    doc.append_child(body, fig).unwrap();
    doc.append_child(body, div).unwrap();

    assert_eq!(obs.start(&mut doc), 1);
    assert!(obs.is_instrumented(fig));
    doc.click(img).unwrap();
    assert_eq!(drain(&mut rx)[0].image_url, "https://x/p.webp");
}
