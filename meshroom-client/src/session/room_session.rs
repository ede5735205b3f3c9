use crate::error::MeshError;
use crate::link::{LinkRef, LinkRole, LinkToken, PeerLink};
use crate::media::{LocalMedia, MediaSource};
use crate::session::session_command::SessionCommand;
use crate::session::session_config::SessionConfig;
use crate::session::session_handle::SessionHandle;
use crate::session::stream_registry::{RegisteredStream, StreamRegistry};
use crate::signaling::{SignalingEvent, SignalingEvents, SignalingOutput};
use crate::transport::{ConnectionState, TransportEvent, TransportFactory};
use meshroom_core::{IceCandidate, ParticipantId, RoomId, SessionDescription};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// One participant's presence in one room.
///
/// Owns the local capture and every peer link. All state changes happen on
/// the task running [`run`](Self::run), one event at a time; the `on_*`
/// handlers are public so the same transitions can be driven directly.
pub struct RoomSession {
    signaling: Arc<dyn SignalingOutput>,
    media_source: Arc<dyn MediaSource>,
    transports: Arc<dyn TransportFactory>,

    local_id: Option<ParticipantId>,
    room_id: Option<RoomId>,
    display_name: String,

    local_media: Option<Arc<LocalMedia>>,
    local_media_tx: watch::Sender<Option<Arc<LocalMedia>>>,

    links: HashMap<ParticipantId, PeerLink>,
    registry: StreamRegistry,
    last_token: LinkToken,

    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    command_tx: mpsc::Sender<SessionCommand>,
    command_rx: mpsc::Receiver<SessionCommand>,

    left: bool,
}

impl RoomSession {
    pub fn new(
        config: SessionConfig,
        signaling: Arc<dyn SignalingOutput>,
        media_source: Arc<dyn MediaSource>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(config.transport_event_buffer);
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (local_media_tx, _) = watch::channel(None);

        Self {
            signaling,
            media_source,
            transports,
            local_id: None,
            room_id: None,
            display_name: String::new(),
            local_media: None,
            local_media_tx,
            links: HashMap::new(),
            registry: StreamRegistry::new(),
            last_token: LinkToken::new(0),
            transport_tx,
            transport_rx,
            command_tx,
            command_rx,
            left: false,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.command_tx.clone(),
            self.registry.clone(),
            self.local_media_tx.subscribe(),
        )
    }

    pub fn registry(&self) -> StreamRegistry {
        self.registry.clone()
    }

    pub fn local_media(&self) -> Option<Arc<LocalMedia>> {
        self.local_media.clone()
    }

    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn link(&self, remote_id: &ParticipantId) -> Option<&PeerLink> {
        self.links.get(remote_id)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn has_left(&self) -> bool {
        self.left
    }

    /// Captures local media and announces presence in `room_id`.
    ///
    /// The announcement waits for an identity if the signaling channel has
    /// not delivered one yet. Media failure aborts the join.
    pub async fn join(
        &mut self,
        room_id: RoomId,
        display_name: impl Into<String>,
    ) -> Result<(), MeshError> {
        if self.left {
            return Err(MeshError::SessionClosed);
        }
        let display_name = display_name.into();
        info!("Joining room {} as '{}'", room_id, display_name);

        self.ensure_local_media().await?;

        self.room_id = Some(room_id);
        self.display_name = display_name;
        self.announce().await
    }

    /// Session event loop. Returns after [`leave`](Self::leave) completed.
    pub async fn run(mut self, mut events: SignalingEvents) {
        info!("Room session event loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Leave { done }) => {
                            self.leave().await;
                            let _ = done.send(());
                            break;
                        }
                        None => {
                            self.leave().await;
                            break;
                        }
                    }
                }

                evt = events.recv() => {
                    match evt {
                        Some(e) => self.handle_signaling_event(e).await,
                        None => {
                            warn!("Signaling channel closed. Leaving room.");
                            self.leave().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        info!("Room session event loop finished");
    }

    pub async fn handle_signaling_event(&mut self, event: SignalingEvent) {
        match event {
            SignalingEvent::Connected { participant_id } => self.on_connected(participant_id).await,
            SignalingEvent::ParticipantJoined {
                participant_id,
                display_name,
            } => {
                self.on_participant_joined(participant_id, display_name)
                    .await
            }
            SignalingEvent::NegotiationStart { from, display_name } => {
                self.on_negotiation_start(from, display_name).await
            }
            SignalingEvent::Description { from, sdp } => self.on_signaling_message(from, sdp).await,
            SignalingEvent::Candidate { from, candidate } => {
                self.on_remote_candidate(from, candidate).await
            }
            SignalingEvent::Disconnected => {
                warn!("Signaling channel lost, waiting for it to reconnect")
            }
        }
    }

    /// The channel (re)connected: adopt the identity and re-announce.
    pub async fn on_connected(&mut self, participant_id: ParticipantId) {
        if self.left {
            return;
        }
        info!("Signaling identity is {}", participant_id);
        self.local_id = Some(participant_id);

        if let Err(e) = self.announce().await {
            error!("Failed to announce presence: {}", e);
        }
    }

    /// Someone joined after us: prepare an answering link and ask them to
    /// offer.
    pub async fn on_participant_joined(&mut self, remote_id: ParticipantId, remote_name: String) {
        if self.left || self.local_id.as_ref() == Some(&remote_id) {
            return;
        }
        if self.links.contains_key(&remote_id) {
            debug!("Link to {} already exists, ignoring join notice", remote_id);
            return;
        }
        info!("Participant {} ('{}') joined", remote_id, remote_name);

        let opened = self
            .open_link(remote_id.clone(), remote_name, LinkRole::Answerer)
            .await;
        if let Err(e) = opened {
            self.fail_link(&remote_id, &e).await;
            return;
        }

        let sent = self
            .signaling
            .send_negotiation_start(&remote_id, &self.display_name)
            .await;
        if let Err(e) = sent {
            self.fail_link(&remote_id, &e).await;
        }
    }

    /// The remote side picked us as offerer.
    pub async fn on_negotiation_start(&mut self, remote_id: ParticipantId, remote_name: String) {
        if self.left || self.local_id.as_ref() == Some(&remote_id) {
            return;
        }
        if self.links.contains_key(&remote_id) {
            debug!("Link to {} already exists, ignoring negotiation start", remote_id);
            return;
        }
        info!("Negotiation requested by {} ('{}')", remote_id, remote_name);

        let opened = self
            .open_link(remote_id.clone(), remote_name, LinkRole::Offerer)
            .await;
        if let Err(e) = opened {
            self.fail_link(&remote_id, &e).await;
        }
    }

    pub async fn on_signaling_message(&mut self, remote_id: ParticipantId, sdp: SessionDescription) {
        if self.left {
            return;
        }
        let Some(link) = self.links.get_mut(&remote_id) else {
            warn!("Stale {:?} from {}: no link", sdp.kind, remote_id);
            return;
        };

        let applied = link.handle_description(sdp, self.signaling.as_ref()).await;
        if let Err(e) = applied {
            self.fail_link(&remote_id, &e).await;
        }
    }

    pub async fn on_remote_candidate(&mut self, remote_id: ParticipantId, candidate: IceCandidate) {
        if self.left {
            return;
        }
        let Some(link) = self.links.get_mut(&remote_id) else {
            debug!("Stale candidate from {}: no link", remote_id);
            return;
        };
        link.handle_remote_candidate(candidate).await;
    }

    /// Routes a transport event to the link instance that raised it.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.left {
            return;
        }
        let source = event.link().clone();
        let Some(link) = self
            .links
            .get_mut(&source.remote_id)
            .filter(|link| link.token() == source.token)
        else {
            debug!("Dropping event from retired link {}", source);
            return;
        };

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                if let Err(e) = link
                    .handle_local_candidate(candidate, self.signaling.as_ref())
                    .await
                {
                    warn!("Failed to trickle candidate to {}: {}", source.remote_id, e);
                }
            }

            TransportEvent::TrackAdded(_, track) => {
                if !link.register_track(track) {
                    return;
                }
                let Some(stream) = link.remote_stream().cloned() else {
                    return;
                };
                let entry = RegisteredStream {
                    stream,
                    display_name: link.remote_name().to_owned(),
                };
                if self.registry.insert(source.remote_id.clone(), entry) {
                    info!("Registered stream of {}", source.remote_id);
                }
            }

            TransportEvent::StateChanged(_, state) => {
                if link.handle_connection_state(state) {
                    self.teardown_link(&source.remote_id).await;
                }
            }
        }
    }

    /// Stops local media, closes every link, then leaves the relay.
    /// Later calls do nothing.
    pub async fn leave(&mut self) {
        if self.left {
            return;
        }
        self.left = true;
        info!(
            "Leaving room {}",
            self.room_id.as_ref().map(RoomId::as_str).unwrap_or("<none>")
        );

        if let Some(media) = self.local_media.take() {
            media.stop();
            self.local_media_tx.send_replace(None);
        }

        let remote_ids: Vec<ParticipantId> = self.links.keys().cloned().collect();
        for remote_id in remote_ids {
            if let Some(link) = self.links.get_mut(&remote_id) {
                link.handle_connection_state(ConnectionState::Closed);
            }
            self.teardown_link(&remote_id).await;
        }

        self.signaling.close().await;
    }

    async fn announce(&self) -> Result<(), MeshError> {
        let (Some(room_id), Some(local_id)) = (&self.room_id, &self.local_id) else {
            debug!("Deferring announce until room and identity are known");
            return Ok(());
        };
        info!("Announcing {} in room {}", local_id, room_id);
        self.signaling
            .announce(room_id, local_id, &self.display_name)
            .await
    }

    async fn ensure_local_media(&mut self) -> Result<Arc<LocalMedia>, MeshError> {
        if let Some(media) = &self.local_media {
            return Ok(media.clone());
        }

        let media = Arc::new(self.media_source.acquire().await?);
        self.local_media = Some(media.clone());
        self.local_media_tx.send_replace(Some(media.clone()));
        Ok(media)
    }

    async fn open_link(
        &mut self,
        remote_id: ParticipantId,
        remote_name: String,
        role: LinkRole,
    ) -> Result<(), MeshError> {
        let media = self.ensure_local_media().await?;

        self.last_token = self.last_token.next();
        let link_ref = LinkRef::new(remote_id.clone(), self.last_token);
        let transport = self
            .transports
            .create(link_ref.clone(), self.transport_tx.clone())
            .await?;

        debug!("Opening {:?} link {}", role, link_ref);
        // Callers have already checked that no link to `remote_id` exists.
        let link = self
            .links
            .entry(remote_id)
            .or_insert_with(|| PeerLink::new(link_ref, remote_name, role, transport));
        link.start(&media, self.signaling.as_ref()).await
    }

    async fn fail_link(&mut self, remote_id: &ParticipantId, err: &MeshError) {
        error!("Link to {} failed: {}", remote_id, err);
        if let Some(link) = self.links.get_mut(remote_id) {
            link.fail();
        }
        self.teardown_link(remote_id).await;
    }

    /// The single cleanup path for a link that reached a terminal state.
    async fn teardown_link(&mut self, remote_id: &ParticipantId) {
        let Some(mut link) = self.links.remove(remote_id) else {
            return;
        };

        if self.registry.remove(remote_id).is_some() {
            info!("Removed stream of {}", remote_id);
        }
        link.close().await;
        info!("Link {} closed in state {}", link.link(), link.state());
    }
}
