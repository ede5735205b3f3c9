use std::sync::Arc;
use tokio::sync::watch;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// The local capture shared by every peer link of a session.
///
/// Links only attach the tracks; stopping is reserved to the session.
pub struct LocalMedia {
    stream_id: String,
    tracks: Vec<Arc<TrackLocalStaticSample>>,
    stopped: watch::Sender<bool>,
}

impl LocalMedia {
    pub fn new(stream_id: impl Into<String>, tracks: Vec<Arc<TrackLocalStaticSample>>) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            stream_id: stream_id.into(),
            tracks,
            stopped,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[Arc<TrackLocalStaticSample>] {
        &self.tracks
    }

    /// Stops every track. Returns `false` if the media was already stopped.
    pub fn stop(&self) -> bool {
        !self.stopped.send_replace(true)
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub fn stopped(&self) -> watch::Receiver<bool> {
        self.stopped.subscribe()
    }
}

impl std::fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMedia")
            .field("stream_id", &self.stream_id)
            .field("tracks", &self.tracks.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
