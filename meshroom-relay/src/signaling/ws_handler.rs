use crate::signaling::relay_service::RelayService;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use meshroom_core::{ParticipantId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Upgrades the request; the relay picks the participant identity.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<RelayService>,
) -> impl IntoResponse {
    let participant_id = ParticipantId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, participant_id, service))
}

async fn handle_socket(socket: WebSocket, participant_id: ParticipantId, service: RelayService) {
    info!("New WebSocket connection: {}", participant_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.add_peer(participant_id.clone(), tx);
    service.send_signal(
        &participant_id,
        &SignalMessage::Welcome {
            participant_id: participant_id.clone(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let participant_id = participant_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(signal) => service.handle_message(&participant_id, signal),
                        Err(e) => warn!("Invalid SignalMessage from {}: {:?}", participant_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.remove_peer(&participant_id);
    info!("WebSocket disconnected: {}", participant_id);
}
