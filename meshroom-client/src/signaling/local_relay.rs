use crate::error::MeshError;
use crate::signaling::signaling_event::{SignalingEvent, SignalingEvents};
use crate::signaling::signaling_output::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use meshroom_core::{IceCandidate, ParticipantId, RoomId, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Default)]
struct RelayInner {
    peers: DashMap<ParticipantId, mpsc::UnboundedSender<SignalingEvent>>,
    rooms: DashMap<RoomId, Vec<ParticipantId>>,
}

/// In-process relay with the same routing rules as the WebSocket relay.
///
/// Every [`connect`](Self::connect) behaves like a fresh socket: it gets its
/// own identity and a `Connected` event before anything else.
#[derive(Clone, Default)]
pub struct LocalRelay {
    inner: Arc<RelayInner>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> (LocalSignaling, SignalingEvents) {
        let participant_id = ParticipantId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let _ = tx.send(SignalingEvent::Connected {
            participant_id: participant_id.clone(),
        });
        self.inner.peers.insert(participant_id.clone(), tx);

        let signaling = LocalSignaling {
            participant_id,
            relay: self.clone(),
            closed: AtomicBool::new(false),
        };
        (signaling, rx)
    }

    pub fn room_members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.inner
            .rooms
            .get(room_id)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, participant_id: &ParticipantId) -> bool {
        self.inner.peers.contains_key(participant_id)
    }

    fn subscribe(&self, room_id: &RoomId, participant_id: &ParticipantId, display_name: &str) {
        let others: Vec<ParticipantId> = {
            let mut members = self.inner.rooms.entry(room_id.clone()).or_default();
            let others = members
                .iter()
                .filter(|member| *member != participant_id)
                .cloned()
                .collect();
            if !members.contains(participant_id) {
                members.push(participant_id.clone());
            }
            others
        };

        debug!(
            "{} joined room {} with {} other members",
            participant_id,
            room_id,
            others.len()
        );
        for other in others {
            self.deliver(
                &other,
                SignalingEvent::ParticipantJoined {
                    participant_id: participant_id.clone(),
                    display_name: display_name.to_owned(),
                },
            );
        }
    }

    fn deliver(&self, to: &ParticipantId, event: SignalingEvent) {
        match self.inner.peers.get(to) {
            Some(peer) => {
                if peer.send(event).is_err() {
                    warn!("Signal to {} dropped: receiver gone", to);
                }
            }
            None => warn!("Attempted to send signal to disconnected participant {}", to),
        }
    }

    fn disconnect(&self, participant_id: &ParticipantId) {
        self.inner.peers.remove(participant_id);
        for mut members in self.inner.rooms.iter_mut() {
            members.retain(|member| member != participant_id);
        }
    }
}

/// One participant's connection to a [`LocalRelay`].
pub struct LocalSignaling {
    participant_id: ParticipantId,
    relay: LocalRelay,
    closed: AtomicBool,
}

impl LocalSignaling {
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    fn ensure_open(&self) -> Result<(), MeshError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MeshError::Signaling("channel closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SignalingOutput for LocalSignaling {
    async fn announce(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError> {
        self.ensure_open()?;
        self.relay.subscribe(room_id, participant_id, display_name);
        Ok(())
    }

    async fn send_negotiation_start(
        &self,
        to: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError> {
        self.ensure_open()?;
        self.relay.deliver(
            to,
            SignalingEvent::NegotiationStart {
                from: self.participant_id.clone(),
                display_name: display_name.to_owned(),
            },
        );
        Ok(())
    }

    async fn send_description(
        &self,
        to: &ParticipantId,
        sdp: SessionDescription,
    ) -> Result<(), MeshError> {
        self.ensure_open()?;
        self.relay.deliver(
            to,
            SignalingEvent::Description {
                from: self.participant_id.clone(),
                sdp,
            },
        );
        Ok(())
    }

    async fn send_candidate(
        &self,
        to: &ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), MeshError> {
        self.ensure_open()?;
        self.relay.deliver(
            to,
            SignalingEvent::Candidate {
                from: self.participant_id.clone(),
                candidate,
            },
        );
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.relay.disconnect(&self.participant_id);
        }
    }
}
