use crate::error::MeshError;
use crate::link::LinkRef;
use crate::media::LocalMedia;
use crate::transport::transport_event::TransportEvent;
use async_trait::async_trait;
use meshroom_core::{IceCandidate, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One peer-to-peer media transport, as seen by a [`PeerLink`](crate::PeerLink).
///
/// Implementations report candidates, tracks and state changes through the
/// event sender they were created with, never by calling back into the link.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Attach every track of the local capture.
    async fn attach_media(&self, media: &LocalMedia) -> Result<(), MeshError>;

    async fn create_offer(&self) -> Result<SessionDescription, MeshError>;

    async fn create_answer(&self) -> Result<SessionDescription, MeshError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), MeshError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), MeshError>;

    /// Must only be called once a remote description is set.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MeshError>;

    async fn close(&self) -> Result<(), MeshError>;
}

/// Creates transports for new links.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        link: LinkRef,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, MeshError>;
}
