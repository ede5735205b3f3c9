use axum::extract::ws::Message;
use dashmap::DashMap;
use meshroom_core::{ParticipantId, RoomId, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct RelayInner {
    peers: DashMap<ParticipantId, mpsc::UnboundedSender<Message>>,
    rooms: DashMap<RoomId, Vec<ParticipantId>>,
    memberships: DashMap<ParticipantId, RoomId>,
}

/// Connection and room bookkeeping shared by every socket task.
#[derive(Clone, Default)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&self, participant_id: ParticipantId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.peers.insert(participant_id, tx);
    }

    /// Forgets a connection and its room membership.
    pub fn remove_peer(&self, participant_id: &ParticipantId) {
        self.inner.peers.remove(participant_id);
        self.leave_room(participant_id);
    }

    /// Closes a connection from the relay side. Returns `false` if the
    /// participant was not connected.
    pub fn disconnect(&self, participant_id: &ParticipantId) -> bool {
        let Some((_, peer)) = self.inner.peers.remove(participant_id) else {
            return false;
        };
        let _ = peer.send(Message::Close(None));
        self.leave_room(participant_id);
        info!("Disconnected {}", participant_id);
        true
    }

    pub fn is_connected(&self, participant_id: &ParticipantId) -> bool {
        self.inner.peers.contains_key(participant_id)
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    pub fn room_members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.inner
            .rooms
            .get(room_id)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    /// Dispatches a frame received on `sender`'s connection.
    pub fn handle_message(&self, sender: &ParticipantId, msg: SignalMessage) {
        match msg {
            SignalMessage::Subscribe {
                room_id,
                participant_id,
                display_name,
            } => {
                if &participant_id != sender {
                    warn!(
                        "{} subscribed as {}, using connection identity",
                        sender, participant_id
                    );
                }
                self.subscribe(room_id, sender, &display_name);
            }
            msg @ (SignalMessage::NegotiationStart { .. }
            | SignalMessage::Description { .. }
            | SignalMessage::Candidate { .. }) => self.forward(sender, msg),
            other => warn!("Unexpected frame from {}: {:?}", sender, other),
        }
    }

    /// Puts `participant_id` in `room_id` and tells everyone already there.
    pub fn subscribe(&self, room_id: RoomId, participant_id: &ParticipantId, display_name: &str) {
        let moved = self
            .inner
            .memberships
            .get(participant_id)
            .is_some_and(|current| *current != room_id);
        if moved {
            self.leave_room(participant_id);
        }

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
        self.inner
            .memberships
            .insert(participant_id.clone(), room_id.clone());

        info!(
            "{} ('{}') joined room {} with {} others",
            participant_id,
            display_name,
            room_id,
            others.len()
        );

        let notice = SignalMessage::NewParticipant {
            participant_id: participant_id.clone(),
            display_name: display_name.to_owned(),
        };
        for other in others {
            self.send_signal(&other, &notice);
        }
    }

    /// Relays an addressed frame after stamping its true sender.
    pub fn forward(&self, sender: &ParticipantId, mut msg: SignalMessage) {
        msg.stamp_sender(sender);
        let Some(target) = msg.target().cloned() else {
            warn!("Frame from {} has no addressee", sender);
            return;
        };
        debug!("Forwarding frame {} -> {}", sender, target);
        self.send_signal(&target, &msg);
    }

    pub fn send_signal(&self, participant_id: &ParticipantId, msg: &SignalMessage) {
        if let Some(peer) = self.inner.peers.get(participant_id) {
            match serde_json::to_string(msg) {
                Ok(json) => {
                    if let Err(e) = peer.send(Message::Text(json.into())) {
                        error!("Failed to send WS message to {}: {:?}", participant_id, e);
                    }
                }
                Err(e) => error!("Failed to serialize signal message: {}", e),
            }
        } else {
            warn!(
                "Attempted to send signal to disconnected participant {}",
                participant_id
            );
        }
    }

    fn leave_room(&self, participant_id: &ParticipantId) {
        let Some((_, room_id)) = self.inner.memberships.remove(participant_id) else {
            return;
        };
        let emptied = match self.inner.rooms.get_mut(&room_id) {
            Some(mut members) => {
                members.retain(|member| member != participant_id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.inner.rooms.remove_if(&room_id, |_, members| members.is_empty());
            debug!("Room {} is empty", room_id);
        }
    }
}
