use meshroom_client::{
    MediaKind, ParticipantId, RoomId, RoomSession, SessionConfig, SignalingEvent,
    SyntheticMediaSource, TransportEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::{init_tracing, joined_session};
use crate::utils::{
    LifecycleEntry, LifecycleLog, MockSignalingOutput, MockTransportFactory, SESSION_TIMEOUT_MS,
    TransportCall, wait_until,
};

#[tokio::test]
async fn test_leave_releases_everything_in_order() {
    init_tracing();

    let log = LifecycleLog::new();
    let factory = MockTransportFactory::default().with_log(log.clone());
    let signaling = MockSignalingOutput::new_stored_only().with_log(log.clone());
    let mut session = RoomSession::new(
        SessionConfig::default(),
        Arc::new(signaling.clone()),
        Arc::new(SyntheticMediaSource::silent()),
        Arc::new(factory.clone()),
    );
    session.on_connected(ParticipantId::new()).await;
    session.join(RoomId::from("lobby"), "alice").await.unwrap();
    let handle = session.handle();
    let bob = ParticipantId::from("bob");
    let carol = ParticipantId::from("carol");
    session.on_participant_joined(bob.clone(), "Bob".into()).await;
    session.on_negotiation_start(carol.clone(), "Carol".into()).await;

    let bob_transport = factory.latest_for(&bob).await.unwrap();
    let carol_transport = factory.latest_for(&carol).await.unwrap();
    session
        .handle_transport_event(TransportEvent::TrackAdded(
            bob_transport.link().clone(),
            bob_transport.track(MediaKind::Video),
        ))
        .await;
    let media = session.local_media().unwrap();

    session.leave().await;

    assert!(session.has_left());
    assert!(media.is_stopped());
    assert!(session.local_media().is_none());
    assert!(handle.local_media().is_none());
    assert_eq!(session.link_count(), 0);
    assert!(session.registry().is_empty());
    assert_eq!(bob_transport.count(&TransportCall::Close).await, 1);
    assert_eq!(carol_transport.count(&TransportCall::Close).await, 1);

    // Media stops before any transport closes; signaling closes last.
    let entries = log.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.last(), Some(&LifecycleEntry::SignalingClosed));
    let mut closed: Vec<ParticipantId> = entries[..2]
        .iter()
        .map(|entry| match entry {
            LifecycleEntry::TransportClosed {
                remote_id,
                media_stopped,
            } => {
                assert!(*media_stopped, "transport to {} closed before media stopped", remote_id);
                remote_id.clone()
            }
            other => panic!("expected a transport close, got {:?}", other),
        })
        .collect();
    closed.sort();
    assert_eq!(closed, vec![bob.clone(), carol.clone()]);

    // Leaving twice does nothing more.
    session.leave().await;
    assert_eq!(signaling.close_count().await, 1);
    assert_eq!(bob_transport.count(&TransportCall::Close).await, 1);
    assert_eq!(log.entries().len(), 3);
}

#[tokio::test]
async fn test_events_after_leave_are_ignored() {
    init_tracing();

    let factory = MockTransportFactory::default();
    let (mut session, signaling, _local_id) = joined_session(&factory, "alice").await;
    session.leave().await;

    session
        .on_participant_joined(ParticipantId::from("dave"), "Dave".into())
        .await;
    session
        .on_negotiation_start(ParticipantId::from("erin"), "Erin".into())
        .await;

    assert_eq!(session.link_count(), 0);
    assert_eq!(factory.created_count().await, 0);
    assert!(
        signaling
            .get_negotiation_starts_to(&ParticipantId::from("dave"))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_handle_leave_stops_event_loop() {
    init_tracing();

    let factory = MockTransportFactory::default();
    let (session, signaling, _local_id) = joined_session(&factory, "alice").await;
    let handle = session.handle();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<SignalingEvent>();

    let task = tokio::spawn(session.run(events_rx));

    handle.leave().await;
    assert_eq!(signaling.close_count().await, 1);
    assert!(handle.local_media().is_none());

    task.await.expect("session task panicked");
    assert!(handle.is_closed());

    // A second leave returns at once.
    handle.leave().await;
    assert_eq!(signaling.close_count().await, 1);
    drop(events_tx);
}

#[tokio::test]
async fn test_leave_waits_for_event_loop_to_start() {
    init_tracing();

    let factory = MockTransportFactory::default();
    let (session, signaling, _local_id) = joined_session(&factory, "alice").await;
    let handle = session.handle();
    let (_events_tx, events_rx) = mpsc::unbounded_channel::<SignalingEvent>();

    let leaving = tokio::spawn({
        let handle = handle.clone();
        async move { handle.leave().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!leaving.is_finished());
    assert_eq!(signaling.close_count().await, 0);

    let task = tokio::spawn(session.run(events_rx));
    tokio::time::timeout(Duration::from_millis(SESSION_TIMEOUT_MS), leaving)
        .await
        .expect("leave never completed")
        .expect("leave task panicked");
    assert_eq!(signaling.close_count().await, 1);
    task.await.expect("session task panicked");
}

#[tokio::test]
async fn test_leave_returns_when_session_is_dropped_unrun() {
    init_tracing();

    let factory = MockTransportFactory::default();
    let (session, signaling, _local_id) = joined_session(&factory, "alice").await;
    let handle = session.handle();

    let leaving = tokio::spawn({
        let handle = handle.clone();
        async move { handle.leave().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(session);

    tokio::time::timeout(Duration::from_millis(SESSION_TIMEOUT_MS), leaving)
        .await
        .expect("leave hung after the session was dropped")
        .expect("leave task panicked");
    assert!(handle.is_closed());
    assert_eq!(signaling.close_count().await, 0);
}

#[tokio::test]
async fn test_lost_signaling_ends_session() {
    init_tracing();

    let factory = MockTransportFactory::default();
    let (session, signaling, _local_id) = joined_session(&factory, "alice").await;
    let handle = session.handle();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<SignalingEvent>();
    tokio::spawn(session.run(events_rx));

    drop(events_tx);

    let closed = wait_until(SESSION_TIMEOUT_MS, || {
        let signaling = signaling.clone();
        async move { signaling.close_count().await == 1 }
    })
    .await;
    assert!(closed, "session did not leave after signaling closed");
    let handle = &handle;
    assert!(wait_until(SESSION_TIMEOUT_MS, move || async move { handle.is_closed() }).await);
}
