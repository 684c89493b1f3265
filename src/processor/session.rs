//! Process sessions
//!
//! A session hands units to a processor and takes back routing decisions.
//! [`MemorySession`] is the in-process implementation used by the CLI
//! driver and the tests.

use super::flowfile::FlowFile;
use super::Relationship;
use crate::types::Attributes;
use bytes::Bytes;
use std::collections::VecDeque;

/// Host-side view of one trigger's unit traffic
pub trait ProcessSession: Send {
    /// Take the next queued unit, if any
    fn get(&mut self) -> Option<FlowFile>;

    /// Mark a unit for delayed retry
    fn penalize(&mut self, flow: FlowFile) -> FlowFile;

    /// Route a unit to a relationship
    fn transfer(&mut self, flow: FlowFile, relationship: Relationship);

    /// Hand a fetched unit back, untouched, to be fetched again
    fn rollback(&mut self, flow: FlowFile);
}

/// Session backed by an in-memory queue
#[derive(Debug, Default)]
pub struct MemorySession {
    queue: VecDeque<FlowFile>,
    transferred: Vec<(Relationship, FlowFile)>,
    next_id: u64,
}

impl MemorySession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new unit and return its id
    pub fn enqueue(&mut self, content: impl Into<Bytes>, attributes: Attributes) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.queue
            .push_back(FlowFile::new(id, content).with_attributes(attributes));
        id
    }

    /// Queue an existing unit
    pub fn push(&mut self, flow: FlowFile) {
        self.next_id = self.next_id.max(flow.id);
        self.queue.push_back(flow);
    }

    /// Units still waiting
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// All routed units in transfer order
    pub fn transferred(&self) -> &[(Relationship, FlowFile)] {
        &self.transferred
    }

    /// Drain routed units
    pub fn take_transferred(&mut self) -> Vec<(Relationship, FlowFile)> {
        std::mem::take(&mut self.transferred)
    }

    /// Units routed to a relationship
    pub fn routed_to(&self, relationship: Relationship) -> Vec<&FlowFile> {
        self.transferred
            .iter()
            .filter(|(rel, _)| *rel == relationship)
            .map(|(_, flow)| flow)
            .collect()
    }

    /// Units routed to success
    pub fn success(&self) -> Vec<&FlowFile> {
        self.routed_to(Relationship::Success)
    }

    /// Units routed to failure
    pub fn failure(&self) -> Vec<&FlowFile> {
        self.routed_to(Relationship::Failure)
    }
}

impl ProcessSession for MemorySession {
    fn get(&mut self) -> Option<FlowFile> {
        self.queue.pop_front()
    }

    fn penalize(&mut self, mut flow: FlowFile) -> FlowFile {
        flow.penalized = true;
        flow
    }

    fn transfer(&mut self, flow: FlowFile, relationship: Relationship) {
        self.transferred.push((relationship, flow));
    }

    fn rollback(&mut self, flow: FlowFile) {
        self.queue.push_front(flow);
    }
}
