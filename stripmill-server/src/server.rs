//! TCP server implementation.

use crate::cluster::ClusterContext;
use crate::config::Config;
use crate::coordinator::{CoordinatorConfig, SessionCoordinator};
use crate::error::ServerError;
use crate::session::Session;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use stripmill_core::{EncodeFormat, StripTransform};
use stripmill_protocol::{OperationField, DEFAULT_PORT, MAX_PAYLOAD_SIZE};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Ranks in the worker pool, coordinator included.
    pub pool_size: usize,
    /// How the operation identifier is read.
    pub operation_field: OperationField,
    /// Largest accepted image payload in bytes.
    pub max_image_size: u32,
    /// Encoding for responses.
    pub encode_format: EncodeFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            pool_size: 4,
            operation_field: OperationField::Fixed,
            max_image_size: MAX_PAYLOAD_SIZE,
            encode_format: EncodeFormat::Png,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the server configuration from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            pool_size: config.cluster.pool_size,
            operation_field: config.protocol.operation_field,
            max_image_size: config.protocol.max_image_size(),
            encode_format: config.output.encode_format(),
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            operation_field: self.operation_field,
            max_image_size: self.max_image_size,
            encode_format: self.encode_format,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub sessions_completed: AtomicU64,
    pub sessions_aborted: AtomicU64,
    pub images_responded: AtomicU64,
    pub images_skipped: AtomicU64,
}

/// TCP server for stripmill.
///
/// Connections are served strictly one at a time. A client that connects
/// while a session is running waits in the listen backlog.
pub struct Server {
    config: ServerConfig,
    coordinator: Mutex<SessionCoordinator>,
    stats: Arc<ServerStats>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server and starts its worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig, transform: Arc<dyn StripTransform>) -> Result<Self, ServerError> {
        let stats = Arc::new(ServerStats::default());
        let cluster = ClusterContext::spawn(config.pool_size, transform)?;
        let coordinator =
            SessionCoordinator::new(cluster, config.coordinator_config(), stats.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            coordinator: Mutex::new(coordinator),
            stats,
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from `listener` until shutdown, then stops the
    /// worker pool.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on {} ({} rank(s))",
            listener.local_addr()?,
            self.config.pool_size
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut coordinator = self.coordinator.lock().await;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((mut stream, addr)) => {
                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            tracing::info!("Client connected: {}", addr);

                            let mut session = Session::new(addr);
                            let result = tokio::select! {
                                result = coordinator.run_session(&mut session, &mut stream) => result,
                                _ = shutdown_requested(&mut shutdown_rx) => Err(ServerError::ShuttingDown),
                            };
                            self.finish_session(&session, result);

                            if *shutdown_rx.borrow() {
                                tracing::info!("Server shutting down");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_requested(&mut shutdown_rx) => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        coordinator.shutdown().await;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn finish_session(&self, session: &Session, result: Result<(), ServerError>) {
        let addr = session.remote_addr;
        match result {
            Ok(()) => {
                self.stats.sessions_completed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    "[{}] Session {} closed: {} responded, {} skipped ({:?})",
                    addr,
                    session.id,
                    session.responded_count(),
                    session.skipped_count(),
                    session.age()
                );
            }
            Err(e) => {
                self.stats.sessions_aborted.fetch_add(1, Ordering::Relaxed);
                if e.is_connection_closed() {
                    tracing::info!(
                        "[{}] Client disconnected in {:?} after {} of {} image(s)",
                        addr,
                        session.state(),
                        session.outcomes().len(),
                        session.image_count()
                    );
                } else {
                    tracing::warn!("[{}] Session {} aborted: {}", addr, session.id, e);
                }
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// Resolves once shutdown has been requested, or the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
