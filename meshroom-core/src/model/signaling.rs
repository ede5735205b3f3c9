use crate::model::description::{IceCandidate, SessionDescription};
use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Frames exchanged between a participant and the relay.
///
/// Point-to-point frames carry both ends: the sender fills `to`, the relay
/// stamps `from` with the identity of the connection it arrived on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum SignalMessage {
    Welcome {
        participant_id: ParticipantId,
    },
    Subscribe {
        room_id: RoomId,
        participant_id: ParticipantId,
        display_name: String,
    },
    NewParticipant {
        participant_id: ParticipantId,
        display_name: String,
    },
    NegotiationStart {
        from: ParticipantId,
        to: ParticipantId,
        display_name: String,
    },
    Description {
        from: ParticipantId,
        to: ParticipantId,
        sdp: SessionDescription,
    },
    Candidate {
        from: ParticipantId,
        to: ParticipantId,
        candidate: IceCandidate,
    },
}

impl SignalMessage {
    /// Addressee of a point-to-point frame.
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            SignalMessage::NegotiationStart { to, .. }
            | SignalMessage::Description { to, .. }
            | SignalMessage::Candidate { to, .. } => Some(to),
            _ => None,
        }
    }

    /// Rewrites the sender of a point-to-point frame.
    pub fn stamp_sender(&mut self, sender: &ParticipantId) {
        match self {
            SignalMessage::NegotiationStart { from, .. }
            | SignalMessage::Description { from, .. }
            | SignalMessage::Candidate { from, .. } => *from = sender.clone(),
            _ => {}
        }
    }
}
