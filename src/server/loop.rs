// Server loop module
// Accepts connections until shutdown is requested

use hyper_util::server::graceful::GracefulShutdown;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use super::connection::spawn_connection;
use super::signal::ShutdownHandle;
use crate::config::AppState;
use crate::logger;

/// Pause after a failed accept; errors like EMFILE repeat until a connection closes
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accept loop
///
/// Returns once `shutdown` fires. Finished connection tasks are reaped as
/// the loop goes so `connections` only holds live ones.
pub async fn accept_loop(
    listener: &TcpListener,
    state: &Arc<AppState>,
    shutdown: &ShutdownHandle,
    graceful: &GracefulShutdown,
    connections: &mut JoinSet<()>,
) {
    loop {
        tokio::select! {
            biased;

            () = shutdown.wait() => break,

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        spawn_connection(stream, peer_addr, state, graceful, connections);
                    }
                    Err(e) => accept_error(&e).await,
                }
            }

            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        logger::log_error(&format!("Connection task panicked: {e}"));
                    }
                }
            }
        }
    }
}

async fn accept_error(err: &io::Error) {
    logger::log_error(&format!("Failed to accept connection: {err}"));
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_accept_error_backs_off() {
        let started = Instant::now();
        accept_error(&io::Error::other("Too many open files")).await;
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }
}
