use crate::error::MeshError;
use crate::signaling::signaling_event::{SignalingEvent, SignalingEvents};
use crate::signaling::signaling_output::SignalingOutput;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshroom_core::{IceCandidate, ParticipantId, RoomId, SessionDescription, SignalMessage};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WsSignalingConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl WsSignalingConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
        }
    }
}

/// Signaling over a WebSocket relay, reconnecting with exponential backoff.
///
/// Every successful (re)connection is reported as
/// [`SignalingEvent::Connected`] once the relay's `welcome` arrives.
pub struct WsSignaling {
    outbound: mpsc::UnboundedSender<SignalMessage>,
    local_id: watch::Receiver<Option<ParticipantId>>,
    shutdown: watch::Sender<bool>,
}

impl WsSignaling {
    pub fn connect(config: WsSignalingConfig) -> (Self, SignalingEvents) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (local_id_tx, local_id) = watch::channel(None);
        let (shutdown, shutdown_rx) = watch::channel(false);

        tokio::spawn(connection_loop(
            config,
            outbound_rx,
            events_tx,
            local_id_tx,
            shutdown_rx,
        ));

        let signaling = Self {
            outbound,
            local_id,
            shutdown,
        };
        (signaling, events_rx)
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.local_id.borrow().clone()
    }

    fn send(&self, msg: SignalMessage) -> Result<(), MeshError> {
        self.outbound
            .send(msg)
            .map_err(|_| MeshError::Signaling("channel closed".into()))
    }

    fn sender_id(&self) -> Result<ParticipantId, MeshError> {
        self.participant_id()
            .ok_or_else(|| MeshError::Signaling("no identity assigned yet".into()))
    }
}

#[async_trait]
impl SignalingOutput for WsSignaling {
    async fn announce(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError> {
        self.send(SignalMessage::Subscribe {
            room_id: room_id.clone(),
            participant_id: participant_id.clone(),
            display_name: display_name.to_owned(),
        })
    }

    async fn send_negotiation_start(
        &self,
        to: &ParticipantId,
        display_name: &str,
    ) -> Result<(), MeshError> {
        self.send(SignalMessage::NegotiationStart {
            from: self.sender_id()?,
            to: to.clone(),
            display_name: display_name.to_owned(),
        })
    }

    async fn send_description(
        &self,
        to: &ParticipantId,
        sdp: SessionDescription,
    ) -> Result<(), MeshError> {
        self.send(SignalMessage::Description {
            from: self.sender_id()?,
            to: to.clone(),
            sdp,
        })
    }

    async fn send_candidate(
        &self,
        to: &ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), MeshError> {
        self.send(SignalMessage::Candidate {
            from: self.sender_id()?,
            to: to.clone(),
            candidate,
        })
    }

    async fn close(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Closing signaling channel");
        }
    }
}

async fn connection_loop(
    config: WsSignalingConfig,
    mut outbound: mpsc::UnboundedReceiver<SignalMessage>,
    events: mpsc::UnboundedSender<SignalingEvent>,
    local_id: watch::Sender<Option<ParticipantId>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = config.reconnect_delay;

    loop {
        if *shutdown.borrow() {
            break;
        }

        match connect_async(config.url.as_str()).await {
            Ok((stream, _)) => {
                info!("Connected to signaling relay {}", config.url);
                delay = config.reconnect_delay;

                let stop = run_connection(stream, &mut outbound, &events, &local_id, &mut shutdown)
                    .await;
                local_id.send_replace(None);
                if stop {
                    break;
                }
                let _ = events.send(SignalingEvent::Disconnected);
                warn!("Signaling relay connection lost");
            }
            Err(e) => warn!("Failed to connect to {}: {}", config.url, e),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, config.max_reconnect_delay);
    }

    debug!("Signaling connection loop finished");
}

/// Doubles the reconnect delay, capped at `max`.
fn next_delay(delay: Duration, max: Duration) -> Duration {
    delay.saturating_mul(2).min(max)
}

/// Pumps one socket until it drops. Returns `true` when the channel was
/// closed on purpose and no reconnect should follow.
async fn run_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<SignalMessage>,
    events: &mpsc::UnboundedSender<SignalingEvent>,
    local_id: &watch::Sender<Option<ParticipantId>>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return true;
            }

            msg = outbound.recv() => {
                let Some(msg) = msg else { return true };
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if let Err(e) = sink.send(Message::Text(json.into())).await {
                            error!("Failed to send WS message: {}", e);
                            return false;
                        }
                    }
                    Err(e) => error!("Failed to serialize signal message: {}", e),
                }
            }

            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(&text, events, local_id),
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Signaling socket error: {}", e);
                    return false;
                }
            },
        }
    }
}

fn handle_frame(
    text: &str,
    events: &mpsc::UnboundedSender<SignalingEvent>,
    local_id: &watch::Sender<Option<ParticipantId>>,
) {
    let msg: SignalMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Invalid SignalMessage from relay: {}", e);
            return;
        }
    };

    if let SignalMessage::Welcome { participant_id } = &msg {
        info!("Relay assigned identity {}", participant_id);
        local_id.send_replace(Some(participant_id.clone()));
    }

    match SignalingEvent::from_message(msg) {
        Some(event) => {
            let _ = events.send(event);
        }
        None => debug!("Ignoring relay frame not meant for participants"),
    }
}
