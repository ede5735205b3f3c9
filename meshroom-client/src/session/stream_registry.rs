use crate::transport::RemoteStream;
use dashmap::DashMap;
use meshroom_core::ParticipantId;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct RegisteredStream {
    pub stream: RemoteStream,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added {
        participant_id: ParticipantId,
        display_name: String,
    },
    Removed {
        participant_id: ParticipantId,
    },
}

/// Remote streams of a session, keyed by participant.
///
/// Clones share the same map. Only the owning session mutates it; everyone
/// else gets the read methods and the change feed.
#[derive(Clone)]
pub struct StreamRegistry {
    streams: Arc<DashMap<ParticipantId, RegisteredStream>>,
    changes: broadcast::Sender<RegistryEvent>,
}

impl StreamRegistry {
    pub(crate) fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            streams: Arc::new(DashMap::new()),
            changes,
        }
    }

    /// Adds the entry unless one exists. Returns whether it was added.
    pub(crate) fn insert(&self, participant_id: ParticipantId, entry: RegisteredStream) -> bool {
        if self.streams.contains_key(&participant_id) {
            return false;
        }
        let display_name = entry.display_name.clone();
        self.streams.insert(participant_id.clone(), entry);
        let _ = self.changes.send(RegistryEvent::Added {
            participant_id,
            display_name,
        });
        true
    }

    pub(crate) fn remove(&self, participant_id: &ParticipantId) -> Option<RegisteredStream> {
        let (_, entry) = self.streams.remove(participant_id)?;
        let _ = self.changes.send(RegistryEvent::Removed {
            participant_id: participant_id.clone(),
        });
        Some(entry)
    }

    pub fn get(&self, participant_id: &ParticipantId) -> Option<RegisteredStream> {
        self.streams
            .get(participant_id)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.streams.contains_key(participant_id)
    }

    pub fn participants(&self) -> Vec<ParticipantId> {
        self.streams.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn snapshot(&self) -> Vec<(ParticipantId, RegisteredStream)> {
        self.streams
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Feed of additions and removals from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.changes.subscribe()
    }
}
