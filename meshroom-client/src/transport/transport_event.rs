use crate::link::LinkRef;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use meshroom_core::IceCandidate;
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Connection status reported by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::Closed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// One inbound track, as reported by the transport.
#[derive(Clone)]
pub struct RemoteTrack {
    pub stream_id: String,
    pub track_id: String,
    pub kind: MediaKind,
    track: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    pub fn new(stream_id: impl Into<String>, track_id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            stream_id: stream_id.into(),
            track_id: track_id.into(),
            kind,
            track: None,
        }
    }

    pub(crate) fn with_track(mut self, track: Arc<TrackRemote>) -> Self {
        self.track = Some(track);
        self
    }

    /// The underlying track, when backed by a live transport.
    pub fn track(&self) -> Option<&Arc<TrackRemote>> {
        self.track.as_ref()
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("stream_id", &self.stream_id)
            .field("track_id", &self.track_id)
            .field("kind", &self.kind)
            .field("live", &self.track.is_some())
            .finish()
    }
}

/// Handle to everything a remote participant sends us.
///
/// Clones share the track set, so tracks that arrive after the stream was
/// handed out show up in every clone.
#[derive(Clone)]
pub struct RemoteStream {
    stream_id: String,
    tracks: Arc<DashMap<String, RemoteTrack>>,
}

impl RemoteStream {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            tracks: Arc::new(DashMap::new()),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Adds a track. Returns `false` if a track with the same id is present.
    pub fn add_track(&self, track: RemoteTrack) -> bool {
        match self.tracks.entry(track.track_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(track);
                true
            }
        }
    }

    /// All tracks, audio first.
    pub fn tracks(&self) -> Vec<RemoteTrack> {
        let mut tracks: Vec<RemoteTrack> =
            self.tracks.iter().map(|entry| entry.value().clone()).collect();
        tracks.sort_by(|a, b| (a.kind, &a.track_id).cmp(&(b.kind, &b.track_id)));
        tracks
    }

    pub fn track(&self, kind: MediaKind) -> Option<RemoteTrack> {
        self.tracks().into_iter().find(|track| track.kind == kind)
    }

    pub fn audio(&self) -> Option<RemoteTrack> {
        self.track(MediaKind::Audio)
    }

    pub fn video(&self) -> Option<RemoteTrack> {
        self.track(MediaKind::Video)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("stream_id", &self.stream_id)
            .field("tracks", &self.tracks())
            .finish()
    }
}

/// Events a transport raises for the session event loop.
///
/// Every event names the link instance it came from so that callbacks of a
/// replaced or closed link can be told apart from the current one.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local candidate was gathered and must be trickled to the remote side.
    CandidateGenerated(LinkRef, IceCandidate),

    /// A remote track arrived.
    TrackAdded(LinkRef, RemoteTrack),

    /// Peer connection state changed.
    StateChanged(LinkRef, ConnectionState),
}

impl TransportEvent {
    pub fn link(&self) -> &LinkRef {
        match self {
            TransportEvent::CandidateGenerated(link, _)
            | TransportEvent::TrackAdded(link, _)
            | TransportEvent::StateChanged(link, _) => link,
        }
    }
}
