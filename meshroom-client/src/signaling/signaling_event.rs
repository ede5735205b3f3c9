use meshroom_core::{IceCandidate, ParticipantId, SessionDescription, SignalMessage};
use tokio::sync::mpsc;

/// Inbound half of the signaling channel, as seen by a room session.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingEvent {
    /// The channel (re)connected and the relay assigned us an identity.
    Connected { participant_id: ParticipantId },

    /// Another participant announced itself in our room.
    ParticipantJoined {
        participant_id: ParticipantId,
        display_name: String,
    },

    NegotiationStart {
        from: ParticipantId,
        display_name: String,
    },

    Description {
        from: ParticipantId,
        sdp: SessionDescription,
    },

    Candidate {
        from: ParticipantId,
        candidate: IceCandidate,
    },

    /// The connection to the relay dropped; a `Connected` follows on recovery.
    Disconnected,
}

pub type SignalingEvents = mpsc::UnboundedReceiver<SignalingEvent>;

impl SignalingEvent {
    /// Maps a relay frame to the event it represents for a participant.
    /// Frames only ever sent by participants map to `None`.
    pub fn from_message(msg: SignalMessage) -> Option<Self> {
        let event = match msg {
            SignalMessage::Welcome { participant_id } => {
                SignalingEvent::Connected { participant_id }
            }
            SignalMessage::NewParticipant {
                participant_id,
                display_name,
            } => SignalingEvent::ParticipantJoined {
                participant_id,
                display_name,
            },
            SignalMessage::NegotiationStart {
                from, display_name, ..
            } => SignalingEvent::NegotiationStart { from, display_name },
            SignalMessage::Description { from, sdp, .. } => {
                SignalingEvent::Description { from, sdp }
            }
            SignalMessage::Candidate {
                from, candidate, ..
            } => SignalingEvent::Candidate { from, candidate },
            SignalMessage::Subscribe { .. } => return None,
        };
        Some(event)
    }
}
