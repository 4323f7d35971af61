//! Page observer: finds image containers, intercepts clicks meant for the
//! page's own image action, and emits download requests instead.
//!
//! Containers present at start are found by [`PageObserver::start`]; content
//! inserted later (infinite scroll, lazy galleries) is picked up from the
//! document's mutation records by [`PageObserver::process_mutations`].

use std::collections::HashSet;

use crate::config::ImgrabConfig;
use crate::dom::{ContainerMarker, Document, MutationRecord, NodeId};
use crate::image_ref::ImageReference;
use crate::message::{DownloadRequest, RequestSender};

pub struct PageObserver {
    marker: ContainerMarker,
    placeholder: String,
    sender: RequestSender,
    /// Containers that already carry a listener. Entries are dropped when the
    /// element leaves the document.
    instrumented: HashSet<NodeId>,
}

impl PageObserver {
    pub fn new(sender: RequestSender, marker: ContainerMarker, placeholder: impl Into<String>) -> Self {
        Self {
            marker,
            placeholder: placeholder.into(),
            sender,
            instrumented: HashSet::new(),
        }
    }

    pub fn from_config(cfg: &ImgrabConfig, sender: RequestSender) -> Self {
        Self::new(sender, cfg.container_marker.clone(), cfg.placeholder_filename.clone())
    }

    /// Begins observing: discards records from before observation and
    /// instruments every container already in the document.
    pub fn start(&mut self, doc: &mut Document) -> usize {
        doc.take_mutations();
        let body = doc.body();
        let attached = self.scan_and_attach(doc, body);
        tracing::info!(containers = attached, "page observer started");
        attached
    }

    pub fn is_instrumented(&self, container: NodeId) -> bool {
        self.instrumented.contains(&container)
    }

    pub fn instrumented_count(&self) -> usize {
        self.instrumented.len()
    }

    /// Instruments `root` and every qualifying container below it. Returns how
    /// many containers got a listener on this call.
    pub fn scan_and_attach(&mut self, doc: &mut Document, root: NodeId) -> usize {
        let mut containers = doc.find_all(root, &self.marker);
        if doc.matches(root, &self.marker) {
            containers.push(root);
        }
        containers
            .into_iter()
            .filter(|c| self.attach_interception(doc, *c))
            .count()
    }

    /// Derives the download reference from an image element's resolved `src`.
    /// None when the element has no `src`; a bad URL degrades to the placeholder name.
    pub fn extract_image_info(&self, doc: &Document, img: NodeId) -> Option<ImageReference> {
        let src = doc.resolved_src(img)?;
        Some(ImageReference::from_url(&src, &self.placeholder))
    }

    /// Attaches click interception to `container` once. Returns true only on
    /// the call that attached a listener.
    ///
    /// With a `button` inside (the page's own image action), clicks on it are
    /// taken over in the capture phase. Without one, clicks landing directly
    /// on the image or the container are. A container whose image has no
    /// `src` yet is left unmarked, and so is one not connected to the
    /// document: only connected removals produce the record that prunes it.
    pub fn attach_interception(&mut self, doc: &mut Document, container: NodeId) -> bool {
        if self.instrumented.contains(&container) {
            return false;
        }
        if !doc.is_connected(container) {
            tracing::debug!(?container, "container is not in the document");
            return false;
        }
        let Some(img) = doc.query_selector(container, "img") else {
            tracing::debug!(?container, "container has no image yet");
            return false;
        };
        let Some(info) = self.extract_image_info(doc, img) else {
            tracing::debug!(?container, "image has no src yet");
            return false;
        };

        let request = DownloadRequest::from(info);
        let sender = self.sender.clone();
        let attached = match doc.query_selector(container, "button") {
            Some(button) => doc.add_event_listener(button, true, move |ev| {
                ev.prevent_default();
                ev.stop_propagation();
                tracing::debug!("default click action prevented on button");
                sender.send(request.clone());
            }),
            None => doc.add_event_listener(container, true, move |ev| {
                let target = ev.target();
                if target == img || target == container {
                    ev.prevent_default();
                    ev.stop_propagation();
                    tracing::debug!("default click action prevented on container/image");
                    sender.send(request.clone());
                }
            }),
        };

        match attached {
            Ok(()) => {
                self.instrumented.insert(container);
                true
            }
            Err(e) => {
                tracing::warn!(?container, "could not attach click interception: {}", e);
                false
            }
        }
    }

    /// Handles queued document mutations: added subtrees are scanned, removed
    /// elements are forgotten. Returns how many containers got a listener.
    pub fn process_mutations(&mut self, doc: &mut Document) -> usize {
        let mut attached = 0;
        for record in doc.take_mutations() {
            match record {
                MutationRecord::Added { node } => {
                    if doc.contains(node) {
                        attached += self.scan_and_attach(doc, node);
                    }
                }
                MutationRecord::Removed { detached, .. } => {
                    for node in detached {
                        self.instrumented.remove(&node);
                    }
                }
            }
        }
        if attached > 0 {
            tracing::debug!(containers = attached, "instrumented dynamically added containers");
        }
        attached
    }
}

#[cfg(test)]
mod tests;
