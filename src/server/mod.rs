//! Embedded HTTP server with pause/resume of its network listener.
//!
//! The server owns a dedicated tokio runtime so its listener outlives any
//! single test thread. Pausing stops the listener (connections are refused)
//! while the router and all application state stay in memory; resuming
//! rebinds the same address.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod context;

/// Embedded server failure.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address being bound.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The dedicated runtime could not be built.
    #[error("failed to build server runtime: {0}")]
    Runtime(#[source] io::Error),
    /// The serve loop ended with an error.
    #[error("server loop failed: {0}")]
    Serve(#[source] io::Error),
    /// The serve task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// The web application root directory does not exist.
    #[error("web application root not found: {}", .0.display())]
    MissingResourceBase(PathBuf),
    /// A previous transition panicked while holding the state lock.
    #[error("server state lock poisoned")]
    LockPoisoned,
}

/// Listener state of a [`PauseableServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Accepting connections.
    Running,
    /// Listener closed; connections are refused.
    Paused,
}

struct Listening {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

/// HTTP server whose listener can be stopped and restarted in place.
pub struct PauseableServer {
    runtime: Runtime,
    addr: SocketAddr,
    router: Router,
    listening: Mutex<Option<Listening>>,
}

impl PauseableServer {
    /// Create a stopped server for `router` on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Runtime`] if the runtime cannot be built.
    pub fn new(addr: SocketAddr, router: Router, worker_threads: usize) -> Result<Self, ServerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("webrig-server")
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;

        Ok(Self {
            runtime,
            addr,
            router: router.layer(TraceLayer::new_for_http()),
            listening: Mutex::new(None),
        })
    }

    /// Start accepting connections. A running server is left as is.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is unavailable.
    pub fn start(&self) -> Result<ServerState, ServerError> {
        self.pause(false)
    }

    /// Pause (`true`) or resume (`false`) the listener.
    ///
    /// Transitions are serialised. Requesting the current state is a no-op.
    /// A failed resume leaves the server paused; a failed pause still closes
    /// the listener and reports how the serve loop ended.
    ///
    /// Must be called from outside any async context: the transition blocks
    /// on the server's own runtime.
    ///
    /// # Errors
    ///
    /// Returns the bind or shutdown error of the failed transition.
    pub fn pause(&self, paused: bool) -> Result<ServerState, ServerError> {
        let mut listening = self.lock()?;

        let result = match (paused, listening.take()) {
            (true, Some(current)) => self.stop_listener(current),
            (true, None) => Ok(ServerState::Paused),
            (false, Some(current)) => {
                *listening = Some(current);
                Ok(ServerState::Running)
            }
            (false, None) => self.start_listener().map(|started| {
                *listening = Some(started);
                ServerState::Running
            }),
        };

        match &result {
            Ok(state) => info!(addr = %self.addr, ?state, "server state"),
            Err(e) => warn!(addr = %self.addr, paused, error = %e, "server transition failed"),
        }
        result
    }

    /// Stop the listener if it is running.
    ///
    /// # Errors
    ///
    /// Returns the serve loop's error, if it ended with one.
    pub fn shutdown(&self) -> Result<(), ServerError> {
        self.pause(true).map(|_| ())
    }

    /// Current listener state.
    pub fn state(&self) -> ServerState {
        match self.listening.lock() {
            Ok(guard) if guard.is_some() => ServerState::Running,
            Ok(_) => ServerState::Paused,
            Err(poisoned) if poisoned.get_ref().is_some() => ServerState::Running,
            Err(_) => ServerState::Paused,
        }
    }

    /// Whether the listener is accepting connections.
    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Address the listener binds to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port the listener binds to.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Listening>>, ServerError> {
        self.listening.lock().map_err(|_| ServerError::LockPoisoned)
    }

    fn start_listener(&self) -> Result<Listening, ServerError> {
        let addr = self.addr;
        let listener = self
            .runtime
            .block_on(TcpListener::bind(addr))
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let app = self.router.clone();
        let task = self.runtime.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        Ok(Listening { shutdown, task })
    }

    fn stop_listener(&self, listening: Listening) -> Result<ServerState, ServerError> {
        // The receiver is gone only if the serve task already ended; the
        // join below reports why.
        let _ = listening.shutdown.send(());
        self.runtime
            .block_on(listening.task)?
            .map_err(ServerError::Serve)?;
        Ok(ServerState::Paused)
    }
}

impl Drop for PauseableServer {
    fn drop(&mut self) {
        if let Ok(listening) = self.listening.get_mut() {
            if let Some(current) = listening.take() {
                let _ = current.shutdown.send(());
            }
        }
    }
}

impl std::fmt::Debug for PauseableServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseableServer")
            .field("addr", &self.addr)
            .field("state", &self.state())
            .finish()
    }
}
