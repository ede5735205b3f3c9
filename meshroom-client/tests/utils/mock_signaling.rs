use async_trait::async_trait;
use meshroom_client::{
    IceCandidate, MeshError, ParticipantId, RoomId, SessionDescription, SignalingOutput,
};
use crate::utils::lifecycle_log::{LifecycleEntry, LifecycleLog};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, PartialEq)]
pub enum SentSignal {
    Announce {
        room_id: RoomId,
        participant_id: ParticipantId,
        display_name: String,
    },
    NegotiationStart {
        to: ParticipantId,
        display_name: String,
    },
    Description {
        to: ParticipantId,
        sdp: SessionDescription,
    },
    Candidate {
        to: ParticipantId,
        candidate: IceCandidate,
    },
    Close,
}

/// Mock SignalingOutput that captures all outgoing signals.
#[derive(Clone)]
pub struct MockSignalingOutput {
    /// Channel to send captured signals.
    tx: mpsc::UnboundedSender<SentSignal>,
    /// All captured signals (for verification).
    signals: Arc<Mutex<Vec<SentSignal>>>,
    /// When set, every send fails with a signaling error.
    failing: Arc<AtomicBool>,
    /// Shared teardown log, if any.
    log: Option<LifecycleLog>,
}

impl MockSignalingOutput {
    /// Create a new MockSignalingOutput and its receiver channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
            log: None,
        };
        (signaling, rx)
    }

    /// Records `close` into `log` as well.
    pub fn with_log(mut self, log: LifecycleLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Create a MockSignalingOutput without a receiver (signals are only stored).
    pub fn new_stored_only() -> Self {
        let (signaling, _rx) = Self::new();
        signaling
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn signals(&self) -> Vec<SentSignal> {
        self.signals.lock().await.clone()
    }

    pub async fn get_announces(&self) -> Vec<(RoomId, ParticipantId, String)> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                SentSignal::Announce {
                    room_id,
                    participant_id,
                    display_name,
                } => Some((room_id.clone(), participant_id.clone(), display_name.clone())),
                _ => None,
            })
            .collect()
    }

    /// Display names sent along with negotiation-start to `to`.
    pub async fn get_negotiation_starts_to(&self, to: &ParticipantId) -> Vec<String> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                SentSignal::NegotiationStart {
                    to: id,
                    display_name,
                } if id == to => Some(display_name.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn get_descriptions_to(&self, to: &ParticipantId) -> Vec<SessionDescription> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                SentSignal::Description { to: id, sdp } if id == to => Some(sdp.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn get_candidates_to(&self, to: &ParticipantId) -> Vec<IceCandidate> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                SentSignal::Candidate { to: id, candidate } if id == to => Some(candidate.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn close_count(&self) -> usize {
        self.signals
            .lock()
            .await
            .iter()
            .filter(|s| matches!(s, SentSignal::Close))
            .count()
    }

    async fn record(&self, signal: SentSignal) -> Result<(), MeshError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MeshError::Signaling("mock channel down".into()));
        }
        tracing::debug!("[MockSignaling] {:?}", signal);
        self.signals.lock().await.push(signal.clone());
        let _ = self.tx.send(signal);
        Ok(())
    }
}

impl Default for MockSignalingOutput {
    fn default() -> Self {
        Self::new_stored_only()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn announce(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError> {
        self.record(SentSignal::Announce {
            room_id: room_id.clone(),
            participant_id: participant_id.clone(),
            display_name: display_name.to_owned(),
        })
        .await
    }

    async fn send_negotiation_start(
        &self,
        to: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError> {
        self.record(SentSignal::NegotiationStart {
            to: to.clone(),
            display_name: display_name.to_owned(),
        })
        .await
    }

    async fn send_description(
        &self,
        to: &ParticipantId,
        sdp: SessionDescription,
    ) -> Result<(), MeshError> {
        self.record(SentSignal::Description { to: to.clone(), sdp })
            .await
    }

    async fn send_candidate(
        &self,
        to: &ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), MeshError> {
        self.record(SentSignal::Candidate {
            to: to.clone(),
            candidate,
        })
        .await
    }

    async fn close(&self) {
        if let Some(log) = &self.log {
            log.push(LifecycleEntry::SignalingClosed);
        }
        self.signals.lock().await.push(SentSignal::Close);
        let _ = self.tx.send(SentSignal::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signaling_captures_description() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let to = ParticipantId::new();

        signaling
            .send_description(&to, SessionDescription::offer("v=0"))
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, SentSignal::Description { .. }));
        assert_eq!(
            signaling.get_descriptions_to(&to).await,
            vec![SessionDescription::offer("v=0")]
        );
    }

    #[tokio::test]
    async fn test_failing_mock_rejects_sends() {
        let signaling = MockSignalingOutput::new_stored_only();
        signaling.set_failing(true);

        let result = signaling
            .send_candidate(&ParticipantId::new(), IceCandidate::new("candidate:1"))
            .await;
        assert!(matches!(result, Err(MeshError::Signaling(_))));
        assert!(signaling.signals().await.is_empty());
    }
}
