//! HTTP/1.1 listener that answers requests from an [`ExpectationRegistry`].
//!
//! # Module Structure
//!
//! - `handler` - hyper request/response conversion and per-request handling
//!
//! The accept loop runs on its own task and stops when [`MockServer::shutdown`]
//! is called or the server is dropped.

mod handler;

pub use handler::{handle_request, to_incoming, to_response, MockBody};

use crate::expectation::{ExpectationRegistry, VerificationFailure};
use crate::metrics;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const VERIFY_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Listener options.
#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Port 0 picks an ephemeral port.
    pub addr: SocketAddr,
    /// Log the size of every reply at debug level.
    pub log_response_content: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_response_content: false,
        }
    }
}

/// A running mock HTTP server.
pub struct MockServer {
    addr: SocketAddr,
    registry: Arc<ExpectationRegistry>,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Bind on an ephemeral local port and start serving.
    pub async fn start(registry: Arc<ExpectationRegistry>) -> Result<Self, ServerError> {
        Self::start_with(ServerOptions::default(), registry).await
    }

    pub async fn start_with(
        options: ServerOptions,
        registry: Arc<ExpectationRegistry>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(options.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: options.addr,
                source,
            })?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

        let loop_registry = Arc::clone(&registry);
        let log_content = options.log_response_content;
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, remote_addr)) => {
                                let registry = Arc::clone(&loop_registry);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let registry = Arc::clone(&registry);
                                        async move { handle_request(req, registry, log_content).await }
                                    });

                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error from {}: {}", remote_addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection on {}: {}", addr, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Mock server on {} shutting down", addr);
                        break;
                    }
                }
            }
        });

        info!(
            "Mock server listening on {} with {} expectation(s)",
            addr,
            registry.len()
        );
        Ok(Self {
            addr,
            registry,
            shutdown_tx,
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("http://{}{}", self.addr, path)
        } else {
            format!("http://{}/{}", self.addr, path)
        }
    }

    pub fn registry(&self) -> &Arc<ExpectationRegistry> {
        &self.registry
    }

    /// Wait up to `timeout` for every call-count constraint to hold.
    pub async fn verify(&self, timeout: Duration) -> Result<(), VerificationFailure> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let unmet = self.registry.unmet();
            if unmet.is_empty() {
                metrics::record_verification(true);
                return Ok(());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                metrics::record_verification(false);
                return Err(VerificationFailure { unmet });
            }
            tokio::time::sleep(VERIFY_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    /// Connections already being served finish on their own.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Mock server task failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("addr", &self.addr)
            .field("expectations", &self.registry.len())
            .finish()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
