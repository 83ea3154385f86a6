//! Refresh tests
//!
//! Drives a Session against a mock status API: status updates, stale
//! entries on failure, late replies for removed entries, and at most one
//! query in flight per entry.

use std::time::Duration;

use mockito::{Mock, Server, ServerGuard};
use streamwatch::api::StatusClient;
use streamwatch::config::Settings;
use streamwatch::provider::Provider;
use streamwatch::session::{Notice, Session, SessionError};

const CHANNEL_URL: &str = "https://twitch.tv/somechannel";

fn session(server: &ServerGuard) -> Session {
    let client = StatusClient::default().with_base_url(Provider::Twitch, server.url());
    Session::new(client, Settings::default())
}

async fn mock_status(server: &mut ServerGuard, status: u16, body: &str) -> Mock {
    server
        .mock("GET", "/streams/somechannel")
        .with_status(status as usize)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

// =============================================================================
// Status Updates
// =============================================================================

#[tokio::test]
async fn test_add_queries_status() {
    let mut server = Server::new_async().await;
    let mock = mock_status(&mut server, 200, r#"{"stream": {"viewers": 4200}}"#).await;

    let mut session = session(&server);
    let key = session.add(CHANNEL_URL, None).unwrap();
    assert!(session.refresh_engine().is_pending(key));

    session.settle_refresh().await;
    mock.assert_async().await;

    let entry = session.registry().get(key).unwrap();
    assert!(entry.online);
    assert_eq!(entry.viewer_count, 4200);
    assert_eq!(
        session.drain_notices(),
        vec![Notice::StatusChanged {
            name: "somechannel".into(),
            online: true,
            viewers: 4200,
        }]
    );
}

#[tokio::test]
async fn test_offline_resets_viewers() {
    let mut server = Server::new_async().await;
    let live = mock_status(&mut server, 200, r#"{"stream": {"viewers": 12}}"#).await;

    let mut session = session(&server);
    let key = session.add(CHANNEL_URL, None).unwrap();
    session.settle_refresh().await;
    session.drain_notices();

    live.remove_async().await;
    let _offline = mock_status(&mut server, 200, r#"{"stream": null}"#).await;

    assert_eq!(session.refresh_all(), 1);
    session.settle_refresh().await;

    let entry = session.registry().get(key).unwrap();
    assert!(!entry.online);
    assert_eq!(entry.viewer_count, 0);
    assert_eq!(
        session.drain_notices(),
        vec![Notice::StatusChanged {
            name: "somechannel".into(),
            online: false,
            viewers: 0,
        }]
    );
}

#[tokio::test]
async fn test_unchanged_status_gives_no_notice() {
    let mut server = Server::new_async().await;
    let _mock = mock_status(&mut server, 200, r#"{"stream": {"viewers": 5}}"#).await;

    let mut session = session(&server);
    session.add(CHANNEL_URL, None).unwrap();
    session.settle_refresh().await;
    session.drain_notices();

    session.refresh_all();
    session.settle_refresh().await;
    assert!(session.drain_notices().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failure_keeps_last_status() {
    let mut server = Server::new_async().await;
    let live = mock_status(&mut server, 200, r#"{"stream": {"viewers": 4200}}"#).await;

    let mut session = session(&server);
    let key = session.add(CHANNEL_URL, None).unwrap();
    session.settle_refresh().await;

    live.remove_async().await;
    let failing = mock_status(&mut server, 500, "").await;

    session.refresh_all();
    session.settle_refresh().await;
    failing.assert_async().await;

    let entry = session.registry().get(key).unwrap();
    assert!(entry.online);
    assert_eq!(entry.viewer_count, 4200);
    assert!(!session.refresh_engine().is_pending(key));
    assert!(session
        .drain_notices()
        .iter()
        .any(|n| matches!(n, Notice::RefreshFailed { name, .. } if name == "somechannel")));
}

#[tokio::test]
async fn test_refresh_unknown_stream() {
    let server = Server::new_async().await;
    let mut session = session(&server);

    let err = session.refresh("nobody").unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_reply_after_removal_is_discarded() {
    let mut server = Server::new_async().await;
    let _mock = mock_status(&mut server, 200, r#"{"stream": {"viewers": 99}}"#).await;

    let mut session = session(&server);
    session.add(CHANNEL_URL, None).unwrap();
    assert!(session.remove("somechannel").is_some());
    assert_eq!(session.refresh_engine().in_flight(), 0);

    // The query was already on its way; its reply must land nowhere
    let processed = tokio::time::timeout(Duration::from_secs(5), session.process_next())
        .await
        .expect("status reply should arrive");
    assert!(processed);

    assert!(session.registry().is_empty());
    assert!(session
        .drain_notices()
        .iter()
        .all(|n| !matches!(n, Notice::StatusChanged { .. })));
}

#[tokio::test]
async fn test_reply_after_re_add_does_not_touch_new_entry() {
    let mut server = Server::new_async().await;
    let _mock = mock_status(&mut server, 200, r#"{"stream": {"viewers": 99}}"#).await;

    let mut session = session(&server);
    let old = session.add(CHANNEL_URL, None).unwrap();
    session.remove(CHANNEL_URL);
    let new = session.add(CHANNEL_URL, None).unwrap();
    assert_ne!(old, new);

    session.settle_refresh().await;
    // Stray reply for the old key, if still queued
    let _ = tokio::time::timeout(Duration::from_millis(200), session.process_next()).await;

    assert_eq!(session.registry().len(), 1);
    let entry = session.registry().get(new).unwrap();
    assert!(entry.online);
    assert_eq!(entry.viewer_count, 99);
}

#[tokio::test]
async fn test_no_overlapping_queries() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/streams/somechannel")
        .with_status(200)
        .with_body(r#"{"stream": null}"#)
        .expect(1)
        .create_async()
        .await;

    let mut session = session(&server);
    let key = session.add(CHANNEL_URL, None).unwrap();

    assert_eq!(session.refresh_all(), 0);
    assert!(!session.refresh("somechannel").unwrap());
    assert!(session.refresh_engine().is_pending(key));

    session.settle_refresh().await;
    mock.assert_async().await;
}
