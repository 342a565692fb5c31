//! Server: TCP listener, per-connection tasks, and lifecycle.
//!
//! Each accepted connection is served by hyper with upgrades enabled, and
//! every request on it goes through [`Router::dispatch`]. A router error
//! (an upgrade outside the tunnel) makes hyper drop that one connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::server::conn::Http;
use hyper::service::service_fn;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{Api, SessionHandle};
use crate::app::Application;
use crate::assistant::AssistantClient;
use crate::config::ServerConfig;
use crate::error::{NetworkError, NetworkResult};
use crate::router::{Router, RouterSnapshot};
use crate::tunnel::Tunnel;

/// Handle returned when the server starts.
///
/// Call [`shutdown`](Self::shutdown) to stop accepting; in-flight connections
/// are asked to finish gracefully.
pub struct ServerHandle {
    /// Address the listener is bound to
    pub addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    router: Arc<Router>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Signal the server to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Dispatch counters so far
    pub fn metrics(&self) -> RouterSnapshot {
        self.router.metrics()
    }

    /// Wait for the accept loop to exit
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::warn!("Accept loop ended abnormally: {}", e);
        }
    }
}

/// Shared state for the accept loop
struct ServerState {
    router: Arc<Router>,
    max_connections: usize,
    /// Active connection count for connection limiting
    active_connections: AtomicUsize,
}

/// Start the server with a fresh browsing session.
pub async fn start(config: ServerConfig, tunnel: Arc<dyn Tunnel>) -> NetworkResult<ServerHandle> {
    start_with_session(config, tunnel, SessionHandle::default()).await
}

/// Start the server around an existing session.
///
/// Binds `config.socket_addr()` (port 0 = OS-assigned) and spawns the accept
/// loop on the current runtime. Failing to bind is the only fatal error.
pub async fn start_with_session(
    config: ServerConfig,
    tunnel: Arc<dyn Tunnel>,
    session: SessionHandle,
) -> NetworkResult<ServerHandle> {
    let bind_addr = config.socket_addr();
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| NetworkError::Bind {
            addr: bind_addr.to_string(),
            source: e,
        })?;
    let addr = listener.local_addr().map_err(|e| NetworkError::Bind {
        addr: bind_addr.to_string(),
        source: e,
    })?;

    let assistant = Arc::new(AssistantClient::new(config.assistant.clone())?);
    if !assistant.is_configured() {
        log::info!("GEMINI_API_KEY not set; assistant replies will report an error");
    }
    let api = Api::new(session, assistant, config.max_body_bytes);
    let application = Arc::new(Application::new(&config, api));
    let router = Arc::new(Router::new(tunnel, application));

    log::info!("Server is running on http://{} ({:?} mode)", addr, config.mode);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(ServerState {
        router: Arc::clone(&router),
        max_connections: config.max_connections,
        active_connections: AtomicUsize::new(0),
    });

    let task = tokio::spawn(accept_loop(listener, state, shutdown_rx));

    Ok(ServerHandle {
        addr,
        shutdown_tx,
        router,
        task,
    })
}

/// Accept loop: listen for connections until shutdown.
async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let max = state.max_connections;
                        if max > 0 {
                            let current = state.active_connections.load(Ordering::Relaxed);
                            if current >= max {
                                log::warn!("Connection limit reached ({}/{}), rejecting {}", current, max, addr);
                                drop(stream);
                                continue;
                            }
                        }

                        state.active_connections.fetch_add(1, Ordering::Relaxed);
                        log::debug!("Accepted connection from {}", addr);
                        let state = Arc::clone(&state);
                        let shutdown = shutdown_rx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, Arc::clone(&state.router), shutdown).await {
                                log::debug!("Connection from {} closed: {}", addr, e);
                            }
                            state.active_connections.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => {
                        log::warn!("Accept error: {}", e);
                    }
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    log::info!("Server shutting down");
                    return;
                }
            }
        }
    }
}

/// Serve every request on one connection through the router
async fn serve_connection(
    stream: TcpStream,
    router: Arc<Router>,
    mut shutdown: watch::Receiver<bool>,
) -> NetworkResult<()> {
    let service = service_fn(move |req| {
        let router = Arc::clone(&router);
        async move { router.dispatch(req).await }
    });

    let conn = Http::new().serve_connection(stream, service).with_upgrades();
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => return result.map_err(NetworkError::from),
            changed = shutdown.changed(), if !draining => {
                if changed.is_err() || *shutdown.borrow() {
                    conn.as_mut().graceful_shutdown();
                    draining = true;
                }
            }
        }
    }
}
