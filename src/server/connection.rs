// Connection handling module
// Serves one accepted TCP connection on its own task

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Spawn a task serving `stream` until the client closes it, the header read
/// timeout fires, or graceful shutdown reaches it.
///
/// The task is owned by `connections` so shutdown can abort stragglers;
/// `graceful` lets shutdown ask the connection to finish its current
/// request and close.
pub fn spawn_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    graceful: &GracefulShutdown,
    connections: &mut JoinSet<()>,
) {
    let io = TokioIo::new(stream);
    let performance = &state.config.performance;

    // HTTP/1.1 with keep-alive; requests on one connection run in order
    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).keep_alive(performance.keep_alive);
    if performance.read_timeout > 0 {
        builder.header_read_timeout(Duration::from_secs(performance.read_timeout));
    }

    let service_state = Arc::clone(state);
    let service = service_fn(move |req| {
        handler::handle_request(req, Arc::clone(&service_state), peer_addr)
    });

    let conn = graceful.watch(builder.serve_connection(io, service));

    connections.spawn(async move {
        if let Err(err) = conn.await {
            // Clients hanging up mid-request or idling past the timeout are routine
            if !(err.is_incomplete_message() || err.is_timeout()) {
                logger::log_connection_error(&format!("{peer_addr}: {err}"));
            }
        }
    });
}
