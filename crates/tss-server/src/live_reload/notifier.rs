//! Change notifier.
//!
//! A standalone listener on its own port that browser tabs connect to. It
//! serves the client script, the WebSocket endpoint and a small HTTP API for
//! triggering reloads from outside the process.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, watch};

use super::websocket;
use crate::error::ServerError;
use crate::serve::{self, ServeHandle};
use crate::state::NotifierState;

/// Browser client script.
const CLIENT_SCRIPT: &str = include_str!("../../assets/livereload.js");

/// Buffered events per client before it starts lagging.
const CHANNEL_CAPACITY: usize = 100;

/// Message sent to connected clients when files change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    /// Always `"reload"`.
    pub command: &'static str,
    /// Changed paths. `"."` means "everything".
    pub files: Vec<String>,
}

impl ReloadEvent {
    fn reload(files: Vec<String>) -> Self {
        Self {
            command: "reload",
            files,
        }
    }
}

/// Fan-out of reload events to every connected client.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Broadcaster {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Push a reload event for `files` to every client.
    ///
    /// Returns the number of clients reached. Having no clients is fine.
    pub fn broadcast_change(&self, files: &[String]) -> usize {
        let reached = self
            .tx
            .send(ReloadEvent::reload(files.to_vec()))
            .unwrap_or(0);
        tracing::debug!(?files, clients = reached, "Broadcast change");
        reached
    }

    /// Subscribe to reload events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Number of current subscribers.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Running change-notification listener.
#[derive(Debug)]
pub(crate) struct ChangeNotifier {
    broadcaster: Broadcaster,
    handle: ServeHandle,
}

impl ChangeNotifier {
    /// Bind `host:port` and start accepting clients.
    pub(crate) async fn start_listening(host: &str, port: u16) -> Result<Self, ServerError> {
        let listener = serve::bind("live reload", host, port).await?;

        let broadcaster = Broadcaster::new();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let router = notifier_router(NotifierState {
            broadcaster: broadcaster.clone(),
            shutdown: shutdown_rx,
        });
        let handle = ServeHandle::spawn("live reload", listener, router, shutdown)?;

        Ok(Self {
            broadcaster,
            handle,
        })
    }

    pub(crate) fn broadcast_change(&self, files: &[String]) -> usize {
        self.broadcaster.broadcast_change(files)
    }

    pub(crate) fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    /// Close client connections and the listener.
    pub(crate) async fn stop_listening(self) {
        self.handle.shutdown().await;
    }
}

fn notifier_router(state: NotifierState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/livereload", get(websocket::ws_handler))
        .route("/livereload.js", get(client_script))
        .route("/changed", post(changed))
        .with_state(state)
}

async fn status(State(state): State<NotifierState>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "clients": state.broadcaster.client_count(),
    }))
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

/// `POST /changed?files=a.css,b.html`
async fn changed(
    State(state): State<NotifierState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let files: Vec<String> = params
        .get("files")
        .map(|files| {
            files
                .split(',')
                .map(str::trim)
                .filter(|file| !file.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    if !files.is_empty() {
        state.broadcaster.broadcast_change(&files);
    }

    Json(json!({ "clients": state.broadcaster.client_count(), "files": files }))
}
