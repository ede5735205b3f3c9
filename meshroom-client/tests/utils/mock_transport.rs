use async_trait::async_trait;
use meshroom_client::{
    ConnectionState, IceCandidate, LinkRef, LocalMedia, MediaKind, MeshError, ParticipantId,
    PeerTransport, RemoteTrack, SdpType, SessionDescription, TransportEvent, TransportFactory,
};
use crate::utils::lifecycle_log::{LifecycleEntry, LifecycleLog};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, watch};

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    AttachMedia,
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddCandidate(String),
    Close,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MockTransportBehavior {
    /// `set_remote_description` fails.
    pub reject_remote: bool,
    /// Emit a local candidate per local description, then an audio and a
    /// video track and `Connected` once both descriptions are set.
    pub auto_connect: bool,
}

/// Records every call instead of talking to a network.
pub struct MockTransport {
    link: LinkRef,
    events: mpsc::Sender<TransportEvent>,
    behavior: MockTransportBehavior,
    calls: Mutex<Vec<TransportCall>>,
    local_set: AtomicBool,
    remote_set: AtomicBool,
    connected: AtomicBool,
    media_stopped: Mutex<Option<watch::Receiver<bool>>>,
    log: Option<LifecycleLog>,
}

impl MockTransport {
    fn new(
        link: LinkRef,
        events: mpsc::Sender<TransportEvent>,
        behavior: MockTransportBehavior,
        log: Option<LifecycleLog>,
    ) -> Self {
        Self {
            link,
            events,
            behavior,
            calls: Mutex::new(Vec::new()),
            local_set: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            media_stopped: Mutex::new(None),
            log,
        }
    }

    pub fn link(&self) -> &LinkRef {
        &self.link
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    /// Candidate strings handed to `add_ice_candidate`, in order.
    pub async fn applied_candidates(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                TransportCall::AddCandidate(candidate) => Some(candidate.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn count(&self, call: &TransportCall) -> usize {
        self.calls.lock().await.iter().filter(|c| *c == call).count()
    }

    /// Raises an event as the transport would.
    pub async fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event).await;
    }

    /// A track of `kind` on this peer's stream.
    pub fn track(&self, kind: MediaKind) -> RemoteTrack {
        let track_id = match kind {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        };
        RemoteTrack::new(format!("stream-{}", self.link.remote_id), track_id, kind)
    }

    async fn record(&self, call: TransportCall) {
        tracing::debug!("[MockTransport {}] {:?}", self.link, call);
        self.calls.lock().await.push(call);
    }

    fn maybe_connect(&self) {
        if !self.behavior.auto_connect
            || !self.local_set.load(Ordering::SeqCst)
            || !self.remote_set.load(Ordering::SeqCst)
            || self.connected.swap(true, Ordering::SeqCst)
        {
            return;
        }
        for kind in [MediaKind::Audio, MediaKind::Video] {
            let _ = self
                .events
                .try_send(TransportEvent::TrackAdded(self.link.clone(), self.track(kind)));
        }
        let _ = self.events.try_send(TransportEvent::StateChanged(
            self.link.clone(),
            ConnectionState::Connected,
        ));
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn attach_media(&self, media: &LocalMedia) -> Result<(), MeshError> {
        self.record(TransportCall::AttachMedia).await;
        *self.media_stopped.lock().await = Some(media.stopped());
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, MeshError> {
        self.record(TransportCall::CreateOffer).await;
        Ok(SessionDescription::offer(format!("mock-offer {}", self.link)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, MeshError> {
        self.record(TransportCall::CreateAnswer).await;
        Ok(SessionDescription::answer(format!("mock-answer {}", self.link)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), MeshError> {
        self.record(TransportCall::SetLocal(desc.kind)).await;
        self.local_set.store(true, Ordering::SeqCst);

        if self.behavior.auto_connect {
            let candidate = IceCandidate::new(format!("candidate:{} 1 udp host", self.link.token));
            let _ = self
                .events
                .try_send(TransportEvent::CandidateGenerated(self.link.clone(), candidate));
        }
        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), MeshError> {
        self.record(TransportCall::SetRemote(desc.kind)).await;
        if self.behavior.reject_remote {
            return Err(MeshError::negotiation(&self.link.remote_id, "malformed sdp"));
        }
        self.remote_set.store(true, Ordering::SeqCst);
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MeshError> {
        self.record(TransportCall::AddCandidate(candidate.candidate)).await;
        Ok(())
    }

    async fn close(&self) -> Result<(), MeshError> {
        self.record(TransportCall::Close).await;
        if let Some(log) = &self.log {
            let media_stopped = self
                .media_stopped
                .lock()
                .await
                .as_ref()
                .is_some_and(|stopped| *stopped.borrow());
            log.push(LifecycleEntry::TransportClosed {
                remote_id: self.link.remote_id.clone(),
                media_stopped,
            });
        }
        Ok(())
    }
}

/// Hands out [`MockTransport`]s and keeps them for inspection.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    behavior: MockTransportBehavior,
    created: Arc<Mutex<Vec<Arc<MockTransport>>>>,
    log: Option<LifecycleLog>,
}

impl MockTransportFactory {
    pub fn new(behavior: MockTransportBehavior) -> Self {
        Self {
            behavior,
            created: Arc::new(Mutex::new(Vec::new())),
            log: None,
        }
    }

    /// Transports created from now on record `close` into `log`.
    pub fn with_log(mut self, log: LifecycleLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn auto_connect() -> Self {
        Self::new(MockTransportBehavior {
            auto_connect: true,
            ..Default::default()
        })
    }

    pub fn rejecting() -> Self {
        Self::new(MockTransportBehavior {
            reject_remote: true,
            ..Default::default()
        })
    }

    pub async fn created_count(&self) -> usize {
        self.created.lock().await.len()
    }

    pub async fn transports_for(&self, remote_id: &ParticipantId) -> Vec<Arc<MockTransport>> {
        self.created
            .lock()
            .await
            .iter()
            .filter(|t| &t.link.remote_id == remote_id)
            .cloned()
            .collect()
    }

    pub async fn latest_for(&self, remote_id: &ParticipantId) -> Option<Arc<MockTransport>> {
        self.transports_for(remote_id).await.pop()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        link: LinkRef,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, MeshError> {
        let transport = Arc::new(MockTransport::new(
            link,
            events,
            self.behavior,
            self.log.clone(),
        ));
        self.created.lock().await.push(transport.clone());
        Ok(transport as Arc<dyn PeerTransport>)
    }
}

/// A bare transport for driving a [`PeerLink`](meshroom_client::PeerLink) by hand.
pub fn standalone_transport(
    link: LinkRef,
    behavior: MockTransportBehavior,
) -> (Arc<MockTransport>, mpsc::Receiver<TransportEvent>) {
    let (tx, rx) = mpsc::channel(64);
    (Arc::new(MockTransport::new(link, tx, behavior, None)), rx)
}
