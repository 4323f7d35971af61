//! In-memory page document the observer runs against.
//!
//! A single-threaded arena of element nodes with class lists, attributes,
//! click listeners (capture and bubble) and a queue of subtree mutations
//! that mirrors what a `MutationObserver` on `body` would record.

mod event;

pub use event::{ClickEvent, Listener, Phase};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;
use url::Url;

/// Handle to an element in a [`Document`].
///
/// Arena slots are reused once an element is removed; the generation makes a
/// stale handle resolve to nothing instead of to the slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Structural marker for image containers: a tag name plus one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerMarker {
    pub tag: String,
    pub class: String,
}

impl ContainerMarker {
    pub fn new(tag: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            class: class.into(),
        }
    }
}

impl Default for ContainerMarker {
    fn default() -> Self {
        Self::new("div", "group/image")
    }
}

/// A change to the connected tree, drained with [`Document::take_mutations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// `node` (and its subtree) was inserted under a connected parent.
    Added { node: NodeId },
    /// `node` was removed; `detached` lists it and every descendant.
    Removed { node: NodeId, detached: Vec<NodeId> },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} already has a parent")]
    AlreadyAttached(NodeId),
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Hierarchy { parent: NodeId, child: NodeId },
    #[error("the document body cannot be removed")]
    RemoveBody,
}

struct RegisteredListener {
    capture: bool,
    callback: Listener,
}

struct Element {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<RegisteredListener>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

struct Slot {
    generation: u32,
    element: Option<Element>,
}

pub struct Document {
    base_url: Url,
    slots: Vec<Slot>,
    /// Indices of empty slots, reused by `create_element`.
    free: Vec<usize>,
    body: NodeId,
    mutations: Vec<MutationRecord>,
}

impl Document {
    /// Creates an empty document whose relative URLs resolve against `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            slots: vec![Slot {
                generation: 0,
                element: Some(Element::new("body")),
            }],
            free: Vec::new(),
            body: NodeId {
                index: 0,
                generation: 0,
            },
            mutations: Vec::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let element = Some(Element::new(tag));
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.element = element;
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            element,
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Number of live elements, `body` included.
    pub fn element_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.element(node).is_ok()
    }

    fn element(&self, node: NodeId) -> Result<&Element, DomError> {
        self.slots
            .get(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.element.as_ref())
            .ok_or(DomError::UnknownNode(node))
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut Element, DomError> {
        self.slots
            .get_mut(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.element.as_mut())
            .ok_or(DomError::UnknownNode(node))
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).ok().map(|e| e.tag.as_str())
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        if !el.classes.iter().any(|c| c == class) {
            el.classes.push(class.to_string());
        }
        Ok(())
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .map(|e| e.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.element_mut(node)?
            .attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .ok()?
            .attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node).ok()?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.element(node)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// True when `node` is reachable from `body`.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == self.body {
                return self.contains(n);
            }
            cur = self.parent(n);
        }
        false
    }

    /// Appends a detached `child` under `parent`. Records an `Added` mutation
    /// when `parent` is connected.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.element(parent)?;
        if self.element(child)?.parent.is_some() || child == self.body {
            return Err(DomError::AlreadyAttached(child));
        }
        let mut cur = Some(parent);
        while let Some(n) = cur {
            if n == child {
                return Err(DomError::Hierarchy { parent, child });
            }
            cur = self.parent(n);
        }

        self.element_mut(child)?.parent = Some(parent);
        self.element_mut(parent)?.children.push(child);
        if self.is_connected(parent) {
            self.mutations.push(MutationRecord::Added { node: child });
        }
        Ok(())
    }

    /// Detaches `node` from its parent and discards it with its subtree.
    /// Records a `Removed` mutation when it was connected.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        if node == self.body {
            return Err(DomError::RemoveBody);
        }
        let was_connected = self.is_connected(node);
        let parent = self.element(node)?.parent;
        if let Some(p) = parent {
            self.element_mut(p)?.children.retain(|c| *c != node);
        }

        let mut detached = vec![node];
        detached.extend(self.descendants(node));
        for id in &detached {
            let slot = &mut self.slots[id.index];
            slot.element = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
        if was_connected {
            self.mutations.push(MutationRecord::Removed { node, detached });
        }
        Ok(())
    }

    /// All descendants of `node` in document order (preorder), excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// First descendant of `node` with the given tag name, like `querySelector("img")`.
    pub fn query_selector(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(node)
            .into_iter()
            .find(|n| self.tag_name(*n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    pub fn matches(&self, node: NodeId, marker: &ContainerMarker) -> bool {
        self.tag_name(node)
            .is_some_and(|t| t.eq_ignore_ascii_case(&marker.tag))
            && self.has_class(node, &marker.class)
    }

    /// Descendants of `node` matching `marker`, in document order.
    pub fn find_all(&self, node: NodeId, marker: &ContainerMarker) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.matches(*n, marker))
            .collect()
    }

    /// The element's `src` resolved against the document base URL, like `img.src`.
    /// Returns the raw attribute when it cannot be resolved; None when absent or empty.
    pub fn resolved_src(&self, node: NodeId) -> Option<String> {
        let raw = self.attribute(node, "src")?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(
            self.base_url
                .join(raw)
                .map(String::from)
                .unwrap_or_else(|_| raw.to_string()),
        )
    }

    pub fn add_event_listener<F>(&mut self, node: NodeId, capture: bool, listener: F) -> Result<(), DomError>
    where
        F: Fn(&mut ClickEvent) + 'static,
    {
        self.element_mut(node)?.listeners.push(RegisteredListener {
            capture,
            callback: Rc::new(listener),
        });
        Ok(())
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.element(node).map(|e| e.listeners.len()).unwrap_or(0)
    }

    /// Drains the queued mutation records.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Dispatches a click on `target` and returns the event after dispatch.
    ///
    /// Capture listeners run from the outermost ancestor down to the target,
    /// then the target's own listeners (capture first), then bubble listeners
    /// back up. `stop_propagation` ends dispatch after the current node.
    pub fn click(&self, target: NodeId) -> Result<ClickEvent, DomError> {
        self.element(target)?;
        let mut path = vec![target];
        let mut cur = self.parent(target);
        while let Some(n) = cur {
            path.push(n);
            cur = self.parent(n);
        }

        let mut event = ClickEvent::new(target);

        for node in path.iter().skip(1).rev() {
            self.invoke(*node, Phase::Capturing, &mut event, |l| l.capture);
            if event.propagation_stopped() {
                return Ok(event);
            }
        }

        self.invoke(target, Phase::AtTarget, &mut event, |l| l.capture);
        self.invoke(target, Phase::AtTarget, &mut event, |l| !l.capture);
        if event.propagation_stopped() {
            return Ok(event);
        }

        for node in path.iter().skip(1) {
            self.invoke(*node, Phase::Bubbling, &mut event, |l| !l.capture);
            if event.propagation_stopped() {
                break;
            }
        }
        Ok(event)
    }

    fn invoke<P>(&self, node: NodeId, phase: Phase, event: &mut ClickEvent, pick: P)
    where
        P: Fn(&RegisteredListener) -> bool,
    {
        let callbacks: Vec<Listener> = match self.element(node) {
            Ok(el) => el
                .listeners
                .iter()
                .filter(|l| pick(l))
                .map(|l| Rc::clone(&l.callback))
                .collect(),
            Err(_) => return,
        };
        event.enter(node, phase);
        for cb in callbacks {
            cb(event);
        }
    }
}
