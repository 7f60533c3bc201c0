//! Streamed (HTTP + Server-Sent Events) transport.
//!
//! ```text
//! GET  /sse                       → event stream; first event `endpoint`
//!                                   carries `/messages?sessionId=<id>`
//! POST /messages?sessionId=<id>   → 202, response arrives later as a
//!                                   `message` event on that stream
//! GET  /health                    → {"status":"ok","sessions":n}
//! ```
//!
//! Each POST is handled on its own task. Closing the stream closes the
//! session; calls already running finish and their responses are dropped.

use crate::protocol::{parse_request, McpHandler, Response};
use crate::transport::session::SessionRegistry;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub handler: McpHandler,
    pub sessions: SessionRegistry,
}

/// Build the transport router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sse", get(open_stream))
        .route("/messages", post(post_message))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `address` and serve until SIGINT/SIGTERM.
pub async fn serve(address: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!(%address, "Streamed transport listening");
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn open_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (guard, rx) = state.sessions.open();
    let endpoint = format!("/messages?sessionId={}", guard.id());

    let announce = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint))
    });
    // The guard lives inside the stream: when axum drops the stream on
    // disconnect, the session is unregistered.
    let messages = ReceiverStream::new(rx).map(move |response| {
        let session = &guard;
        Ok(message_event(session.id(), &response))
    });

    Sse::new(announce.chain(messages)).keep_alive(KeepAlive::default())
}

fn message_event(session: &str, response: &Response) -> Event {
    match serde_json::to_string(response) {
        Ok(body) => Event::default().event("message").data(body),
        Err(e) => {
            warn!(session, "Failed to encode response: {}", e);
            Event::default().comment("unencodable response dropped")
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Result<StatusCode, TransportError> {
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or(TransportError::MissingSession)?;
    let sender = state
        .sessions
        .sender(&session_id)
        .ok_or_else(|| TransportError::UnknownSession(session_id.clone()))?;
    let request = parse_request(&body).map_err(|resp| {
        TransportError::InvalidMessage(
            resp.error
                .map(|e| e.message)
                .unwrap_or_else(|| "invalid message".into()),
        )
    })?;

    debug!(session = %session_id, method = %request.method, "Routing message");
    let handler = state.handler.clone();
    tokio::spawn(async move {
        if let Some(response) = handler.handle(request).await {
            if sender.send(response).await.is_err() {
                warn!(session = %session_id, "Session closed before its response was delivered");
            }
        }
    });
    Ok(StatusCode::ACCEPTED)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "sessions": state.sessions.len() }))
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("missing sessionId query parameter")]
    MissingSession,
    #[error("session not found: {0}")]
    UnknownSession(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl TransportError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TransportError::MissingSession | TransportError::InvalidMessage(_) => {
                StatusCode::BAD_REQUEST
            }
            TransportError::UnknownSession(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
