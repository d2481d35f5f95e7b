//! Server module
//!
//! Owns the listening socket, the accept loop, and shutdown:
//!
//! ```no_run
//! # async fn demo() -> Result<(), clock_server::error::ServerError> {
//! use clock_server::config::Config;
//! use clock_server::server::Server;
//!
//! let server = Server::bind(Config::default())?;
//! let handle = server.shutdown_handle();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown();
//! });
//! server.run().await
//! # }
//! ```

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the file is mounted under another name
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_listener;
pub use signal::{start_signal_handler, ShutdownHandle};

use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::{AppState, Config};
use crate::error::ServerError;
use crate::logger;

/// A bound static file server, ready to [`run`](Server::run)
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Resolve the root directory and bind the listening socket.
    ///
    /// Prints the serving URL on success. Must be called from within a
    /// Tokio runtime.
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let addr = config.get_socket_addr()?;
        let state = Arc::new(AppState::new(config)?);
        let listener = create_listener(addr).map_err(|source| ServerError::Bind { addr, source })?;

        let local_addr = listener.local_addr()?;
        logger::log_server_start(&local_addr, &state.root, &state.config);

        Ok(Self {
            listener,
            state,
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops [`run`](Server::run) from any task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve until shutdown is requested.
    ///
    /// On shutdown the listener is closed first, releasing the port. Open
    /// connections are then asked to finish their current request and
    /// close; whatever is still running after
    /// `performance.shutdown_grace_period` is aborted.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self {
            listener,
            state,
            shutdown,
        } = self;

        let local_addr = listener.local_addr()?;
        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();

        server_loop::accept_loop(&listener, &state, &shutdown, &graceful, &mut connections).await;

        drop(listener);
        logger::log_shutdown_complete(&local_addr);

        let grace = Duration::from_secs(state.config.performance.shutdown_grace_period);
        if tokio::time::timeout(grace, graceful.shutdown()).await.is_err() {
            logger::log_warning(&format!(
                "{} connection(s) still open after {}s grace period, closing them",
                connections.len(),
                grace.as_secs()
            ));
        }
        connections.shutdown().await;

        Ok(())
    }
}
