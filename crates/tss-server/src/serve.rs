//! Listener binding and background serving with graceful shutdown.

use std::io;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ServerError;

/// Bind a TCP listener, naming the listener in the error.
pub(crate) async fn bind(
    what: &'static str,
    host: &str,
    port: u16,
) -> Result<TcpListener, ServerError> {
    TcpListener::bind((host, port))
        .await
        .map_err(|source| ServerError::Bind {
            what,
            host: host.to_owned(),
            port,
            source,
        })
}

/// A router served on a background task.
#[derive(Debug)]
pub(crate) struct ServeHandle {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<io::Result<()>>,
}

impl ServeHandle {
    /// Serve `router` on `listener` until [`shutdown`](Self::shutdown).
    ///
    /// `shutdown` may be shared with long-lived connection tasks (WebSockets)
    /// so they close when the listener does.
    pub(crate) fn spawn(
        what: &'static str,
        listener: TcpListener,
        router: Router,
        shutdown: watch::Sender<bool>,
    ) -> Result<Self, ServerError> {
        let addr = listener.local_addr()?;
        let mut signal = shutdown.subscribe();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    // Either an explicit `true` or a dropped sender ends serving.
                    while !*signal.borrow_and_update() {
                        if signal.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await;
            tracing::debug!(what, "Listener closed");
            result
        });

        tracing::info!(what, address = %addr, "Listening");
        Ok(Self {
            addr,
            shutdown,
            task,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub(crate) async fn shutdown(self) {
        let Self {
            addr,
            shutdown,
            task,
        } = self;

        let _ = shutdown.send(true);
        drop(shutdown);

        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(address = %addr, error = %e, "Server exited with error"),
            Err(e) => tracing::warn!(address = %addr, error = %e, "Server task failed"),
        }
    }
}
