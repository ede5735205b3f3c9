use crate::error::MeshError;
use crate::link::candidate_queue::CandidateQueue;
use crate::link::link_ref::{LinkRef, LinkToken};
use crate::link::link_state::{LinkInput, LinkRole, LinkState};
use crate::media::LocalMedia;
use crate::signaling::SignalingOutput;
use crate::transport::{ConnectionState, PeerTransport, RemoteStream, RemoteTrack};
use meshroom_core::{IceCandidate, ParticipantId, SdpType, SessionDescription};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to an inbound candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Applied,
    Queued,
    Dropped,
}

/// Negotiation state of the connection to one remote participant.
///
/// A link never talks to the session directly: it is driven through its
/// `handle_*` methods and reports outcomes through return values, which keeps
/// every transition testable without a live transport.
pub struct PeerLink {
    link: LinkRef,
    remote_name: String,
    role: LinkRole,
    state: LinkState,
    connection: ConnectionState,
    transport: Arc<dyn PeerTransport>,
    local_description: Option<SessionDescription>,
    candidates: CandidateQueue,
    remote_stream: Option<RemoteStream>,
}

impl PeerLink {
    pub fn new(
        link: LinkRef,
        remote_name: impl Into<String>,
        role: LinkRole,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            link,
            remote_name: remote_name.into(),
            role,
            state: LinkState::New,
            connection: ConnectionState::New,
            transport,
            local_description: None,
            candidates: CandidateQueue::new(),
            remote_stream: None,
        }
    }

    pub fn link(&self) -> &LinkRef {
        &self.link
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.link.remote_id
    }

    pub fn token(&self) -> LinkToken {
        self.link.token
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote_stream.as_ref()
    }

    pub fn queued_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Attaches the local tracks; an offerer then sends its offer.
    pub async fn start(
        &mut self,
        media: &LocalMedia,
        signaling: &dyn SignalingOutput,
    ) -> Result<(), MeshError> {
        self.transport
            .attach_media(media)
            .await
            .map_err(|e| self.negotiation_error("attach media", e))?;

        if self.role == LinkRole::Answerer {
            debug!("Link {} waiting for an offer", self.link);
            return Ok(());
        }

        let offer = self
            .transport
            .create_offer()
            .await
            .map_err(|e| self.negotiation_error("create offer", e))?;
        self.transport
            .set_local_description(offer.clone())
            .await
            .map_err(|e| self.negotiation_error("local offer", e))?;

        self.local_description = Some(offer.clone());
        self.transition(LinkInput::LocalOffer);

        signaling.send_description(&self.link.remote_id, offer).await?;
        info!("Sent offer to {}", self.link.remote_id);
        Ok(())
    }

    /// Applies an inbound offer or answer.
    ///
    /// Descriptions the current state cannot accept are logged and ignored;
    /// a description the transport rejects is a negotiation error.
    pub async fn handle_description(
        &mut self,
        desc: SessionDescription,
        signaling: &dyn SignalingOutput,
    ) -> Result<(), MeshError> {
        let input = match desc.kind {
            SdpType::Offer => LinkInput::RemoteOffer,
            SdpType::Answer => LinkInput::RemoteAnswer,
        };
        if self.state.next(input).is_none() {
            warn!(
                "Ignoring {:?} from {} in state {}",
                desc.kind, self.link, self.state
            );
            return Ok(());
        }
        if self.candidates.is_drained() {
            warn!(
                "Ignoring {:?} from {}: remote description already applied",
                desc.kind, self.link
            );
            return Ok(());
        }

        self.transport
            .set_remote_description(desc.clone())
            .await
            .map_err(|e| self.negotiation_error("remote description", e))?;
        self.flush_candidates().await;

        if desc.kind == SdpType::Offer {
            let answer = self
                .transport
                .create_answer()
                .await
                .map_err(|e| self.negotiation_error("create answer", e))?;
            self.transport
                .set_local_description(answer.clone())
                .await
                .map_err(|e| self.negotiation_error("local answer", e))?;

            self.local_description = Some(answer.clone());
            self.transition(input);

            signaling.send_description(&self.link.remote_id, answer).await?;
            info!("Sent answer to {}", self.link.remote_id);
        } else {
            self.transition(input);
            info!("Applied answer from {}", self.link.remote_id);
        }

        Ok(())
    }

    /// Applies a remote candidate now, or queues it until the remote
    /// description is set.
    pub async fn handle_remote_candidate(&mut self, candidate: IceCandidate) -> CandidateDisposition {
        if self.state.is_terminal() {
            return CandidateDisposition::Dropped;
        }

        if self.candidates.is_drained() {
            self.apply_candidate(candidate).await;
            CandidateDisposition::Applied
        } else {
            debug!("Queueing candidate for {} until remote description", self.link);
            self.candidates
                .enqueue(self.link.remote_id.clone(), candidate);
            CandidateDisposition::Queued
        }
    }

    /// Trickles a locally gathered candidate to the remote side.
    pub async fn handle_local_candidate(
        &self,
        candidate: IceCandidate,
        signaling: &dyn SignalingOutput,
    ) -> Result<(), MeshError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        signaling
            .send_candidate(&self.link.remote_id, candidate)
            .await
    }

    /// Records a remote track.
    ///
    /// Returns `true` only when the track opens the link's stream. Later
    /// tracks attach to that stream in place.
    pub fn register_track(&mut self, track: RemoteTrack) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if let Some(stream) = &self.remote_stream {
            if stream.add_track(track.clone()) {
                debug!("Attached {:?} track to {}", track.kind, self.link);
            }
            return false;
        }
        debug!("First remote track from {}: {:?}", self.link, track);
        let stream = RemoteStream::new(track.stream_id.clone());
        stream.add_track(track);
        self.remote_stream = Some(stream);
        true
    }

    /// Feeds a transport state report.
    ///
    /// Returns `true` exactly once: for the report that moves the link into a
    /// terminal state.
    pub fn handle_connection_state(&mut self, state: ConnectionState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.connection = state;

        let Some(input) = LinkInput::from_connection(state) else {
            return false;
        };
        self.transition(input) && self.state.is_terminal()
    }

    /// Marks a negotiation failure. Same exactly-once contract as
    /// [`handle_connection_state`](Self::handle_connection_state).
    pub fn fail(&mut self) -> bool {
        self.transition(LinkInput::TransportFailed)
    }

    /// Releases the transport and anything still queued.
    pub async fn close(&mut self) {
        self.transition(LinkInput::TransportClosed);

        let lost = self.candidates.discard();
        if lost > 0 {
            debug!("Discarded {} queued candidates for {}", lost, self.link);
        }
        self.remote_stream = None;

        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport for {}: {}", self.link, e);
        }
    }

    async fn flush_candidates(&mut self) {
        let queued = self.candidates.drain();
        if !queued.is_empty() {
            debug!("Applying {} queued candidates for {}", queued.len(), self.link);
        }
        for entry in queued {
            self.apply_candidate(entry.candidate).await;
        }
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate for {}: {}", self.link, e);
        }
    }

    fn transition(&mut self, input: LinkInput) -> bool {
        match self.state.next(input) {
            Some(next) => {
                debug!("Link {}: {} -> {}", self.link, self.state, next);
                self.state = next;
                true
            }
            None => false,
        }
    }

    fn negotiation_error(&self, step: &str, err: MeshError) -> MeshError {
        MeshError::negotiation(&self.link.remote_id, format!("{step}: {err}"))
    }
}
