use crate::error::MeshError;
use async_trait::async_trait;
use meshroom_core::{IceCandidate, ParticipantId, RoomId, SessionDescription};

/// Outbound half of the signaling channel.
///
/// Point-to-point sends are stamped with the local identity by the adapter,
/// so callers only name the addressee.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Announce presence in a room.
    async fn announce(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError>;

    /// Ask `to` to become the offerer of our link.
    async fn send_negotiation_start(
        &self,
        to: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError>;

    async fn send_description(
        &self,
        to: &ParticipantId,
        sdp: SessionDescription,
    ) -> Result<(), MeshError>;

    async fn send_candidate(
        &self,
        to: &ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), MeshError>;

    /// Leave the relay. Safe to call more than once.
    async fn close(&self);
}
