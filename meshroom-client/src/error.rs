use meshroom_core::ParticipantId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("local media unavailable: {0}")]
    MediaAcquisition(String),

    #[error("negotiation with {peer} failed: {reason}")]
    Negotiation { peer: ParticipantId, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] webrtc::Error),

    #[error("signaling error: {0}")]
    Signaling(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MeshError {
    pub fn negotiation(peer: &ParticipantId, reason: impl ToString) -> Self {
        Self::Negotiation {
            peer: peer.clone(),
            reason: reason.to_string(),
        }
    }
}
