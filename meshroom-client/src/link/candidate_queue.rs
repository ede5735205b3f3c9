use meshroom_core::{IceCandidate, ParticipantId};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCandidate {
    pub remote_id: ParticipantId,
    pub candidate: IceCandidate,
}

/// Holds remote candidates that arrive before the remote description.
///
/// Drained exactly once, right after the description is applied. Once
/// drained, candidates bypass the queue. Anything still queued when the link
/// closes is discarded.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    entries: VecDeque<QueuedCandidate>,
    drained: bool,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, remote_id: ParticipantId, candidate: IceCandidate) {
        debug_assert!(!self.drained, "candidate queued after the queue was drained");
        self.entries.push_back(QueuedCandidate {
            remote_id,
            candidate,
        });
    }

    /// Returns every queued entry in arrival order and empties the queue.
    pub fn drain(&mut self) -> Vec<QueuedCandidate> {
        debug_assert!(!self.drained, "candidate queue drained twice");
        self.drained = true;
        self.entries.drain(..).collect()
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Drops pending entries, returning how many were lost.
    pub fn discard(&mut self) -> usize {
        let lost = self.entries.len();
        self.entries.clear();
        lost
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
