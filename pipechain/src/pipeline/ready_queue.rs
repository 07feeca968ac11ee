//! Priority-ordered set of stages with pending work.

use crate::core::MessageKind;
use std::collections::BTreeSet;

/// A (stage index, message kind) pair with pending messages.
pub type ReadySlot = (usize, MessageKind);

/// Tracks which stage queues are non-empty.
///
/// Slots order by stage index first, then requests before responses, so
/// [`ReadyQueue::next`] yields the lowest stage with pending work and,
/// within it, its pending request ahead of its pending response.
#[derive(Debug, Clone, Default)]
pub struct ReadyQueue {
    slots: BTreeSet<ReadySlot>,
}

impl ReadyQueue {
    /// Creates an empty ready queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a queue as holding at least one message.
    pub fn mark(&mut self, stage: usize, kind: MessageKind) {
        self.slots.insert((stage, kind));
    }

    /// Marks a queue as drained.
    pub fn clear(&mut self, stage: usize, kind: MessageKind) {
        self.slots.remove(&(stage, kind));
    }

    /// Returns the slot to process next without removing it.
    #[must_use]
    pub fn next(&self) -> Option<ReadySlot> {
        self.slots.first().copied()
    }

    /// Returns true if the given queue is marked.
    #[must_use]
    pub fn contains(&self, stage: usize, kind: MessageKind) -> bool {
        self.slots.contains(&(stage, kind))
    }

    /// Returns the number of non-empty queues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no stage has pending work.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
