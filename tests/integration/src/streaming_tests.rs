//! Streaming integration tests
//!
//! End-to-end checks of streaming sessions: frame order, per-frame error
//! reporting, exactly-once completion and the `Stream` adapter.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_backends::*;
use chat_relay::{Client, Error, FirebaseConfig, SessionState, StaticToken};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

/// Chunks arrive in wire order, then one clean completion
#[tokio::test]
async fn test_stream_preserves_order() {
    init_tracing();
    let relay = MockRelay::new().await;
    relay
        .mock_stream(sse_body("gpt-4o", &["The ", "quick ", "brown ", "fox"]))
        .await;

    let client = firebase_client(&relay.url(), "t");
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert_eq!(outcome.content(), "The quick brown fox");
    assert_eq!(outcome.items.len(), 5);
    assert_eq!(outcome.frame_errors(), 0);
    assert!(outcome.terminal.is_none());
    assert_eq!(outcome.terminal_calls, 1);

    let last = outcome.items.last().unwrap().as_ref().unwrap();
    assert_eq!(last.finish_reason(), Some("stop"));
}

/// Streaming requests carry `stream: true` and the backend's auth
#[tokio::test]
async fn test_stream_request_shape() {
    let relay = MockRelay::new().await;
    relay.mock_stream(sse_body("gpt-4o", &["hi"])).await;

    let client = supabase_client(&relay.url(), "jwt", Some("u123"));
    run_stream(&client, simple_query("gpt-4o")).await;

    let requests = relay.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(header_value(&requests[0], "authorization"), Some("Bearer jwt"));
    let body = body_json(&requests[0]);
    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["user_id"], json!("u123"));
}

/// A malformed frame is reported and later frames still arrive
#[tokio::test]
async fn test_malformed_frame_does_not_end_session() {
    let relay = MockRelay::new().await;
    let mut body = sse_event(&stream_chunk("gpt-4o", Some("before"), None));
    body.push_str("data: {not json\n\n");
    body.push_str(&sse_event(&stream_chunk("gpt-4o", Some(" after"), Some("stop"))));
    relay.mock_stream(body).await;

    let client = firebase_client(&relay.url(), "t");
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert_eq!(outcome.content(), "before after");
    assert_eq!(outcome.frame_errors(), 1);
    assert!(matches!(outcome.items[1], Err(Error::Decode(_))));
    assert!(outcome.terminal.is_none());
}

/// An error envelope inside the stream is an API error item
#[tokio::test]
async fn test_in_stream_error_envelope() {
    let relay = MockRelay::new().await;
    let mut body = sse_event(&stream_chunk("gpt-4o", Some("partial"), None));
    body.push_str(&sse_event(&error_body("server_error", "upstream overloaded")));
    relay.mock_stream(body).await;

    let client = firebase_client(&relay.url(), "t");
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert_eq!(outcome.items.len(), 2);
    match &outcome.items[1] {
        Err(Error::Api { status, message, .. }) => {
            assert_eq!(*status, 0);
            assert_eq!(message, "upstream overloaded");
        }
        other => panic!("unexpected item: {other:?}"),
    }
    assert_eq!(outcome.terminal_calls, 1);
}

/// Newline-delimited JSON without SSE framing is accepted
#[tokio::test]
async fn test_ndjson_stream() {
    let relay = MockRelay::new().await;
    let body = format!(
        "{}\n{}\n",
        stream_chunk("gpt-4o", Some("one"), None),
        stream_chunk("gpt-4o", Some(" two"), Some("stop"))
    );
    relay.mock_stream(body).await;

    let client = firebase_client(&relay.url(), "t");
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert_eq!(outcome.content(), "one two");
}

/// A final frame without a trailing blank line is still delivered
#[tokio::test]
async fn test_unterminated_final_frame() {
    let relay = MockRelay::new().await;
    let body = format!("data: {}", stream_chunk("gpt-4o", Some("tail"), Some("stop")));
    relay.mock_stream(body).await;

    let client = firebase_client(&relay.url(), "t");
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert_eq!(outcome.content(), "tail");
    assert!(outcome.terminal.is_none());
}

/// A non-success status ends the session with the decoded API error
#[tokio::test]
async fn test_stream_rejected_with_api_error() {
    let relay = MockRelay::new().await;
    relay
        .mock_stream_failure(403, error_body("forbidden", "App Check token rejected"))
        .await;

    let client = firebase_client(&relay.url(), "t");
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert!(outcome.items.is_empty());
    assert_eq!(outcome.terminal_calls, 1);
    let err = outcome.terminal.unwrap();
    assert_eq!(err.status_code(), Some(403));
    assert!(err.to_string().contains("App Check token rejected"));
}

/// An unreachable relay completes with a transport error
#[tokio::test]
async fn test_stream_unreachable() {
    let client = firebase_client("http://127.0.0.1:9", "t");
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert!(outcome.items.is_empty());
    assert!(outcome.terminal.unwrap().is_transport());
    assert_eq!(client.active_sessions(), 0);
}

/// A relay that goes quiet mid-stream ends the session once the timeout
/// passes without data
#[tokio::test]
async fn test_stalled_stream_times_out() {
    let base_url = stalling_relay(sse_event(&stream_chunk("gpt-4o", Some("first"), None))).await;

    let client = Client::new(
        FirebaseConfig::new(base_url, StaticToken::new("t")).with_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    let outcome = run_stream(&client, simple_query("gpt-4o")).await;

    assert_eq!(outcome.content(), "first");
    assert_eq!(outcome.terminal_calls, 1);
    assert!(outcome.terminal.unwrap().is_transport());
    assert_eq!(client.active_sessions(), 0);
}

/// The session leaves the registry before the terminal callback runs
#[tokio::test]
async fn test_deregistered_before_terminal_callback() {
    let relay = MockRelay::new().await;
    relay.mock_stream(sse_body("gpt-4o", &["a", "b"])).await;

    let client = firebase_client(&relay.url(), "t");
    let observer = client.clone();
    let (tx, rx) = tokio::sync::oneshot::channel();

    client.chat_stream_with_callbacks(
        simple_query("gpt-4o"),
        |_| {},
        move |error| {
            let _ = tx.send((error.is_none(), observer.active_sessions()));
        },
    );

    let (ok, active_at_completion) = rx.await.unwrap();
    assert!(ok);
    assert_eq!(active_at_completion, 0);
}

/// The `Stream` adapter yields every chunk then ends
#[tokio::test]
async fn test_chat_stream_adapter() {
    let relay = MockRelay::new().await;
    relay
        .mock_stream(sse_body("gpt-4o", &["Hello", ", ", "world"]))
        .await;

    let client = firebase_client(&relay.url(), "t");
    let mut stream = client.chat_stream(simple_query("gpt-4o"));

    let mut count = 0;
    while let Some(item) = stream.next().await {
        item.unwrap();
        count += 1;
    }

    assert_eq!(count, 4);
    assert!(stream.is_done());
    assert_eq!(stream.summary().content, "Hello, world");
    assert_eq!(stream.summary().finish_reason.as_deref(), Some("stop"));
    assert_eq!(stream.summary().model, "gpt-4o");
    assert_eq!(client.active_sessions(), 0);
}

/// A terminating failure is the last item of the adapter
#[tokio::test]
async fn test_chat_stream_terminal_error_is_last() {
    let relay = MockRelay::new().await;
    relay
        .mock_stream_failure(500, error_body("server_error", "boom"))
        .await;

    let client = firebase_client(&relay.url(), "t");
    let items: Vec<_> = client.chat_stream(simple_query("gpt-4o")).collect().await;

    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(Error::Api { status: 500, .. })));
}

/// `collect_content` concatenates a clean stream
#[tokio::test]
async fn test_collect_content() {
    let relay = MockRelay::new().await;
    relay.mock_stream(sse_body("gpt-4o", &["to", "ge", "ther"])).await;

    let client = firebase_client(&relay.url(), "t");
    let content = client
        .chat_stream(simple_query("gpt-4o"))
        .collect_content()
        .await
        .unwrap();

    assert_eq!(content, "together");
}

/// Sessions end in a terminal state
#[test]
fn test_terminal_states() {
    assert!(SessionState::CompletedSuccess.is_terminal());
    assert!(SessionState::CompletedError.is_terminal());
    assert!(!SessionState::Active.is_terminal());
    assert!(!SessionState::Idle.is_terminal());
}
