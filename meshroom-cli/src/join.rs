use anyhow::{Context, Result};
use colored::*;
use meshroom_client::{
    IceServerConfig, RegistryEvent, RoomId, RoomSession, SessionConfig, SyntheticMediaSource,
    TransportConfig, WebRtcTransportFactory, WsSignaling, WsSignalingConfig,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

pub struct JoinArgs {
    pub url: String,
    pub room: String,
    pub name: String,
    pub stun: Vec<String>,
}

pub async fn run(args: JoinArgs) -> Result<()> {
    let mut transport_config = TransportConfig::default();
    if !args.stun.is_empty() {
        transport_config.ice_servers = args.stun.into_iter().map(IceServerConfig::stun).collect();
    }

    let (signaling, events) = WsSignaling::connect(WsSignalingConfig::new(&args.url));
    let mut session = RoomSession::new(
        SessionConfig::default(),
        Arc::new(signaling),
        Arc::new(SyntheticMediaSource::new()),
        Arc::new(WebRtcTransportFactory::new(transport_config)),
    );

    session
        .join(RoomId::from(args.room.as_str()), &args.name)
        .await
        .context("Failed to join room")?;

    let handle = session.handle();
    let mut changes = handle.registry().subscribe();
    let mut session_task = tokio::spawn(session.run(events));

    println!(
        "{} {} as {}",
        "🎥 Joined room".green().bold(),
        args.room.cyan(),
        args.name.cyan()
    );
    println!("{}", "   Press Ctrl-C to leave.".dimmed());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            finished = &mut session_task => {
                finished.context("Session task panicked")?;
                println!("{}", "⚠️  Session ended: signaling relay closed.".yellow());
                return Ok(());
            }

            change = changes.recv() => match change {
                Ok(RegistryEvent::Added { participant_id, display_name }) => {
                    println!("{} {} ({})", "+".green().bold(), display_name, participant_id);
                }
                Ok(RegistryEvent::Removed { participant_id }) => {
                    println!("{} {}", "-".red().bold(), participant_id);
                }
                Err(RecvError::Lagged(missed)) => warn!("Missed {} registry updates", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    println!("{}", "👋 Leaving room...".yellow());
    handle.leave().await;
    session_task.await.context("Session task panicked")?;
    println!("{}", "✨ Left cleanly.".green().bold());

    Ok(())
}
