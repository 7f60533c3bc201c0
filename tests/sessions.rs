//! Router-level tests of the streamed transport.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use pdf_convert_mcp::transport::{router, AppState, SessionRegistry};
use pdf_convert_mcp::{McpHandler, Orchestrator, ServerConfig};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

fn build_test_app() -> (Router, SessionRegistry) {
    let sessions = SessionRegistry::new();
    let state = AppState {
        handler: McpHandler::new(Orchestrator::new(ServerConfig::default())),
        sessions: sessions.clone(),
    };
    (router(state), sessions)
}

fn post_message(session: Option<&str>, body: &str) -> Request<Body> {
    let uri = match session {
        Some(id) => format!("/messages?sessionId={id}"),
        None => "/messages".to_string(),
    };
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read SSE chunks until one contains `needle`.
async fn read_until<S>(stream: &mut S, needle: &str) -> String
where
    S: futures::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin,
{
    let mut seen = String::new();
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            chunk = stream.next() => {
                let chunk = chunk.expect("stream ended").expect("stream error");
                seen.push_str(&String::from_utf8_lossy(&chunk));
                if seen.contains(needle) {
                    return seen;
                }
            }
            _ = &mut deadline => panic!("timed out waiting for {needle:?}; got {seen:?}"),
        }
    }
}

fn session_id_from(endpoint_event: &str) -> String {
    let start = endpoint_event.find("sessionId=").unwrap() + "sessionId=".len();
    endpoint_event[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect()
}

#[tokio::test]
async fn health_reports_live_sessions() {
    let (app, _sessions) = build_test_app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn message_for_unknown_session_is_not_found() {
    let (app, _sessions) = build_test_app();
    let response = app
        .oneshot(post_message(
            Some("00000000-0000-4000-8000-000000000000"),
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_without_session_is_bad_request() {
    let (app, _sessions) = build_test_app();
    let response = app
        .oneshot(post_message(None, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_round_trip_and_teardown_on_disconnect() {
    let (app, sessions) = build_test_app();

    // Open the stream and learn the session id.
    let response = ServiceExt::<Request<Body>>::oneshot(
        app.clone(),
        Request::get("/sse").body(Body::empty()).unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = response.into_body().into_data_stream();
    let endpoint = read_until(&mut stream, "sessionId=").await;
    assert!(endpoint.contains("event: endpoint"));
    let id = session_id_from(&endpoint);
    assert!(sessions.contains(&id));

    // Malformed body on a live session.
    let bad = ServiceExt::<Request<Body>>::oneshot(app.clone(), post_message(Some(&id), "{oops"))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    // A request is accepted and answered on the stream.
    let accepted = ServiceExt::<Request<Body>>::oneshot(
        app.clone(),
        post_message(Some(&id), r#"{"jsonrpc":"2.0","id":42,"method":"ping"}"#),
    )
    .await
    .unwrap();
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);
    let event = read_until(&mut stream, "\"id\":42").await;
    assert!(event.contains("event: message"));

    // Dropping the stream is a disconnect: the session is gone.
    drop(stream);
    assert!(!sessions.contains(&id));
    let after = ServiceExt::<Request<Body>>::oneshot(
        app,
        post_message(Some(&id), r#"{"jsonrpc":"2.0","id":43,"method":"ping"}"#),
    )
    .await
    .unwrap();
    assert_eq!(after.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_sessions_are_isolated() {
    let (app, sessions) = build_test_app();

    let open = |app: Router| async move {
        let response = app
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.into_body().into_data_stream()
    };
    let mut a = open(app.clone()).await;
    let mut b = open(app.clone()).await;
    let id_a = session_id_from(&read_until(&mut a, "sessionId=").await);
    let id_b = session_id_from(&read_until(&mut b, "sessionId=").await);
    assert_ne!(id_a, id_b);
    assert_eq!(sessions.len(), 2);

    let accepted = app
        .oneshot(post_message(
            Some(&id_b),
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);
    let event = read_until(&mut b, "\"id\":7").await;
    assert!(event.contains("pdf_to_jpg"));

    drop(a);
    assert_eq!(sessions.len(), 1);
    assert!(sessions.contains(&id_b));
}
