use meshroom_client::ParticipantId;
use std::sync::{Arc, Mutex};

/// Teardown steps, in the order the mocks observed them.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEntry {
    TransportClosed {
        remote_id: ParticipantId,
        /// Whether the attached local media was already stopped.
        media_stopped: bool,
    },
    SignalingClosed,
}

/// Ordered log shared between mock transports and mock signaling.
#[derive(Debug, Clone, Default)]
pub struct LifecycleLog(Arc<Mutex<Vec<LifecycleEntry>>>);

impl LifecycleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: LifecycleEntry) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<LifecycleEntry> {
        self.0.lock().unwrap().clone()
    }
}
