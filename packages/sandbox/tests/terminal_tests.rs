// ABOUTME: Integration tests for terminal sessions and the streaming bridge
// ABOUTME: Input ordering, session lifecycle, output leases and disconnect recovery

mod common;

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::AsyncReadExt;

use atelier_sandbox::{
    forward_output, SandboxError, SessionStatus, SessionStore, TerminalEvent,
    TerminalSessionManager, TerminalSize,
};

use common::{test_pool, FakeRuntime};

async fn setup_manager(runtime: Arc<FakeRuntime>) -> TerminalSessionManager {
    let store = SessionStore::new(test_pool().await);
    store.init_schema().await.unwrap();
    TerminalSessionManager::new(runtime, store)
}

#[tokio::test]
async fn start_defaults_to_80x24_and_generates_id() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();

    assert!(!session.id.is_empty());
    assert_eq!((session.cols, session.rows), (80, 24));
    assert_eq!(session.status, SessionStatus::Running);
    assert_eq!(session.process_id, "exec-1");
}

#[tokio::test]
async fn caller_supplied_session_id_is_kept_and_duplicates_refused() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", Some("term-1".to_string()), None)
        .await
        .unwrap();
    assert_eq!(session.id, "term-1");

    let duplicate = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", Some("term-1".to_string()), None)
        .await;
    assert!(matches!(duplicate, Err(SandboxError::Validation(_))));
}

#[tokio::test]
async fn writes_reach_process_input_in_submission_order() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();
    let mut spawn = runtime.take_last_spawn();

    manager.write(&session.id, b"echo one\n").await.unwrap();
    manager.write(&session.id, b"echo two\n").await.unwrap();

    let mut buf = vec![0u8; 18];
    spawn.input_peer.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"echo one\necho two\n");
}

#[tokio::test]
async fn write_after_stop_yields_session_not_found() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();

    manager.stop(&session.id).await.unwrap();
    assert_eq!(manager.get(&session.id).await.unwrap().status, SessionStatus::Exited);

    assert!(matches!(
        manager.write(&session.id, b"ls\n").await,
        Err(SandboxError::SessionNotFound(_))
    ));
    assert!(matches!(
        manager.stop(&session.id).await,
        Err(SandboxError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn resize_updates_row_and_notifies_process() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start(
            "rt-1",
            "inst-1",
            "proj-1",
            "user-1",
            None,
            Some(TerminalSize { cols: 100, rows: 30 }),
        )
        .await
        .unwrap();

    manager.resize(&session.id, 120, 40).await.unwrap();

    let row = manager.get(&session.id).await.unwrap();
    assert_eq!((row.cols, row.rows), (120, 40));
    assert_eq!(
        runtime.resize_calls.lock().unwrap().as_slice(),
        &[("exec-1".to_string(), 120, 40)]
    );

    assert!(matches!(
        manager.resize(&session.id, 0, 40).await,
        Err(SandboxError::Validation(_))
    ));
}

#[tokio::test]
async fn output_lease_is_exclusive_until_dropped() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();

    let lease = manager.take_output(&session.id).await.unwrap();
    assert!(matches!(
        manager.take_output(&session.id).await,
        Err(SandboxError::OutputLeased(_))
    ));

    // Dropping the lease returns the source; the next subscribe succeeds
    drop(lease);
    assert!(manager.take_output(&session.id).await.is_ok());
}

#[tokio::test]
async fn bridge_relays_chunks_then_exit() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();
    let spawn = runtime.take_last_spawn();

    spawn.output_tx.send(Ok(Bytes::from_static(b"$ "))).unwrap();
    spawn.output_tx.send(Ok(Bytes::from_static(b"hello\n"))).unwrap();
    drop(spawn.output_tx); // end-of-output

    let lease = manager.take_output(&session.id).await.unwrap();
    let mut events = forward_output(lease);

    assert!(matches!(events.next().await, Some(TerminalEvent::Output(b)) if b.as_ref() == b"$ "));
    assert!(
        matches!(events.next().await, Some(TerminalEvent::Output(b)) if b.as_ref() == b"hello\n")
    );
    assert!(matches!(events.next().await, Some(TerminalEvent::Exit)));
    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn bridge_emits_one_error_event_then_closes() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();
    let spawn = runtime.take_last_spawn();

    spawn
        .output_tx
        .send(Err(SandboxError::Stream("relay broke".to_string())))
        .unwrap();

    let lease = manager.take_output(&session.id).await.unwrap();
    let mut events = forward_output(lease);

    assert!(matches!(events.next().await, Some(TerminalEvent::Error(_))));
    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn client_disconnect_releases_the_read_lock() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();
    let spawn = runtime.take_last_spawn();
    spawn.output_tx.send(Ok(Bytes::from_static(b"one"))).unwrap();

    let lease = manager.take_output(&session.id).await.unwrap();
    let mut events = forward_output(lease);
    assert!(matches!(events.next().await, Some(TerminalEvent::Output(_))));

    // Simulated disconnect: the consumer drops the event stream mid-flight
    drop(events);

    // The lease went back; a new subscriber picks up where the stream left off
    spawn.output_tx.send(Ok(Bytes::from_static(b"two"))).unwrap();
    let lease = manager.take_output(&session.id).await.unwrap();
    let mut events = forward_output(lease);
    assert!(matches!(events.next().await, Some(TerminalEvent::Output(b)) if b.as_ref() == b"two"));
}

#[tokio::test]
async fn mark_exited_removes_session_and_updates_row() {
    let runtime = Arc::new(FakeRuntime::default());
    let manager = setup_manager(runtime.clone()).await;

    let session = manager
        .start("rt-1", "inst-1", "proj-1", "user-1", None, None)
        .await
        .unwrap();

    manager.mark_exited(&session.id).await.unwrap();
    assert_eq!(manager.get(&session.id).await.unwrap().status, SessionStatus::Exited);
    assert!(matches!(
        manager.write(&session.id, b"x").await,
        Err(SandboxError::SessionNotFound(_))
    ));
}
