//! Click events and listener callbacks.

use super::NodeId;
use std::rc::Rc;

/// Click listener. Listeners never get document access; they capture what they need.
pub type Listener = Rc<dyn Fn(&mut ClickEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Capturing,
    AtTarget,
    Bubbling,
}

#[derive(Debug, Clone)]
pub struct ClickEvent {
    target: NodeId,
    current_target: NodeId,
    phase: Phase,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl ClickEvent {
    pub(super) fn new(target: NodeId) -> Self {
        Self {
            target,
            current_target: target,
            phase: Phase::AtTarget,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub(super) fn enter(&mut self, node: NodeId, phase: Phase) {
        self.current_target = node;
        self.phase = phase;
    }

    /// The node the click landed on.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The node whose listener is running.
    pub fn current_target(&self) -> NodeId {
        self.current_target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}
