use crate::media::LocalMedia;
use crate::session::session_command::SessionCommand;
use crate::session::stream_registry::StreamRegistry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// What the presentation layer holds on to while a session runs.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    registry: StreamRegistry,
    local_media: watch::Receiver<Option<Arc<LocalMedia>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<SessionCommand>,
        registry: StreamRegistry,
        local_media: watch::Receiver<Option<Arc<LocalMedia>>>,
    ) -> Self {
        Self {
            command_tx,
            registry,
            local_media,
        }
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Local capture, once acquired and until the session leaves.
    pub fn local_media(&self) -> Option<Arc<LocalMedia>> {
        self.local_media.borrow().clone()
    }

    /// Leaves the room and waits for cleanup. A no-op once the session ended.
    ///
    /// The request is served by [`RoomSession::run`](crate::RoomSession::run):
    /// it stays pending until that loop is running and has processed it, and
    /// returns early if the session is dropped without ever being run.
    pub async fn leave(&self) {
        let (done, finished) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Leave { done })
            .await
            .is_err()
        {
            return;
        }
        let _ = finished.await;
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}
