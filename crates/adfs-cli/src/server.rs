//! HTTP and WebSocket transport. Each `/ws` connection becomes one engine
//! session; the `/api` routes read shared engine state.

use crate::logging::LogBuffer;
use adfs_core::export::{self, ExportFormat};
use adfs_core::protocol::ServerMessage;
use adfs_core::session::{Engine, Session};
use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

const LOG_LINES: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub logs: LogBuffer,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/profiles", get(list_profiles))
        .route("/api/status", get(status))
        .route("/api/history", get(history).delete(clear_history))
        .route("/api/history/export", get(export_history))
        .route("/api/logs", get(logs))
        .with_state(state)
}

/// Serves until `shutdown` resolves, then disconnects every profile.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let engine = state.engine.clone();
    let addr = listener.local_addr().context("read listener address")?;
    info!(%addr, "server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("serve http")?;
    let disconnected = engine.connections.disconnect_all().await;
    info!(disconnected, "server stopped");
    Ok(())
}

pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| client_session(socket, state.engine))
}

async fn client_session(socket: WebSocket, engine: Arc<Engine>) {
    let (session, mut events) = Session::open(engine);
    let (mut outbound, mut inbound) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = ServerMessage::from(event).to_json();
            if outbound.send(Message::Text(text)).await.is_err() {
                debug!("client went away; dropping remaining events");
                break;
            }
        }
    });

    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_text(&text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "websocket receive failed");
                break;
            }
        }
    }

    session.close();
    writer.abort();
}

async fn list_profiles(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.registry.all().to_vec())
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let profiles = state.engine.connections.snapshot();
    let connected = state.engine.connections.connected_profiles().len();
    Json(serde_json::json!({
        "profiles": profiles,
        "connected": connected,
        "total": profiles.len(),
    }))
}

async fn history(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.history.list())
}

async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.engine.history.clear();
    info!("history cleared");
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

async fn export_history(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let format = match query.format.as_deref().unwrap_or("json").parse::<ExportFormat>() {
        Ok(format) => format,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    let (history, results) = state.engine.history.snapshot();
    match export::render(format, &history, &results) {
        Ok(body) => {
            let disposition = format!(
                "attachment; filename=\"adfs-fleet-history.{}\"",
                format.extension()
            );
            (
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(err) => {
            warn!(error = %err, "history export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    profile: Option<String>,
}

async fn logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> impl IntoResponse {
    Json(state.logs.recent_lines(LOG_LINES, query.profile.as_deref()))
}
