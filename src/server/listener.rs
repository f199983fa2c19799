//! TCP Listener and Accept Loop
//!
//! [`start`] binds the address and returns as soon as the socket is listening;
//! the accept loop runs on its own task and spawns one [`ConnectionHandler`]
//! task per client.
//!
//! ## Shutdown
//!
//! ```text
//!  cancel.cancel()
//!        │
//!        ▼
//!  accept loop wakes (select! on cancelled())
//!        │
//!        ▼
//!  listener dropped ──> no new connections
//!
//!  already-running connection tasks keep serving
//!  until their clients disconnect
//! ```
//!
//! [`ConnectionHandler`]: crate::connection::ConnectionHandler

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::{StorageEngine, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed accept so persistent errors (EMFILE) don't spin.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors returned from [`start`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The address could not be bound (in use, permission denied, ...)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The bound socket could not report its local address
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// A handle to a running server.
///
/// Dropping the handle does not stop the server; call [`ServerHandle::stop`]
/// or cancel the token passed to [`start`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    stats: Arc<ConnectionStats>,
    storage: Arc<dyn Store>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("stopped", &self.cancel.is_cancelled())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ServerHandle {
    /// The address the listener is bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    pub fn storage(&self) -> &Arc<dyn Store> {
        &self.storage
    }

    /// Stops accepting new connections.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the accept loop to return.
    ///
    /// Once this resolves the listening socket is closed. Connections accepted
    /// earlier may still be running.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Accept loop terminated abnormally");
        }
    }

    /// Stops the server and waits for the accept loop to return.
    pub async fn shutdown(self) {
        self.stop();
        self.wait().await;
    }
}

/// Binds `addr` and starts accepting connections with a fresh store.
///
/// Returns once the socket is bound; the only error is a bind failure.
/// Cancelling `cancel` stops the accept loop.
///
/// # Example
///
/// ```no_run
/// use linekv::server;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), linekv::server::ServerError> {
/// let cancel = CancellationToken::new();
/// let server = server::start("0.0.0.0:6379", cancel.clone()).await?;
///
/// // ... later
/// cancel.cancel();
/// server.wait().await;
/// # Ok(())
/// # }
/// ```
pub async fn start(addr: &str, cancel: CancellationToken) -> Result<ServerHandle, ServerError> {
    start_with_storage(addr, cancel, Arc::new(StorageEngine::new())).await
}

/// Like [`start`], but serves an existing store.
pub async fn start_with_storage(
    addr: &str,
    cancel: CancellationToken,
    storage: Arc<dyn Store>,
) -> Result<ServerHandle, ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    info!(addr = %local_addr, "Listening");

    let stats = Arc::new(ConnectionStats::new());
    let command_handler = CommandHandler::new(Arc::clone(&storage));

    let task = tokio::spawn(accept_loop(
        listener,
        command_handler,
        Arc::clone(&stats),
        cancel.clone(),
    ));

    Ok(ServerHandle {
        local_addr,
        cancel,
        stats,
        storage,
        task,
    })
}

/// Accepts connections until `cancel` fires, then drops the listener.
async fn accept_loop(
    listener: TcpListener,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        // Anything that raced with cancellation counts as shutdown, not failure.
        if cancel.is_cancelled() {
            if let Ok((_, addr)) = &accepted {
                debug!(client = %addr, "Dropping connection accepted during shutdown");
            }
            break;
        }

        match accepted {
            Ok((stream, addr)) => {
                let handler = command_handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                if !backoff(&cancel).await {
                    break;
                }
            }
        }
    }

    drop(listener);
    info!("Server shutting down, no longer accepting connections");
}

/// Sleeps for [`ACCEPT_ERROR_BACKOFF`]. Returns `false` if cancelled first.
async fn backoff(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpStream;

    struct TestClient {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read_half, writer) = stream.into_split();
            Self {
                reader: BufReader::new(read_half),
                writer,
            }
        }

        /// Sends one line and returns the reply without its terminator.
        async fn send(&mut self, line: &str) -> String {
            self.writer
                .write_all(format!("{}\n", line).as_bytes())
                .await
                .unwrap();

            let mut reply = String::new();
            self.reader.read_line(&mut reply).await.unwrap();
            assert!(reply.ends_with('\n'), "reply not terminated: {:?}", reply);
            assert!(!reply.ends_with("\r\n"), "reply has CR: {:?}", reply);
            reply.pop();
            reply
        }
    }

    async fn start_test_server() -> (ServerHandle, CancellationToken) {
        let cancel = CancellationToken::new();
        let server = start("127.0.0.1:0", cancel.clone()).await.unwrap();
        (server, cancel)
    }

    #[tokio::test]
    async fn test_basic_commands() {
        let (server, _cancel) = start_test_server().await;
        let mut client = TestClient::connect(server.local_addr()).await;

        assert_eq!(client.send("PING").await, "PONG");
        assert_eq!(client.send("PING hello there").await, "PONG hello there");
        assert_eq!(client.send("ECHO foo bar").await, "foo bar");
        assert_eq!(client.send("ECHO").await, "");
        assert!(client.send("FOOBAR").await.starts_with("-ERR"));
        assert_eq!(client.send("GET never-written").await, "-ERR no such key");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_multiple_pings_on_one_connection() {
        let (server, _cancel) = start_test_server().await;
        let mut client = TestClient::connect(server.local_addr()).await;

        for i in 0..5 {
            assert_eq!(client.send(&format!("PING {}", i)).await, format!("PONG {}", i));
        }
    }

    #[tokio::test]
    async fn test_cross_connection_visibility() {
        let (server, _cancel) = start_test_server().await;
        let mut writer = TestClient::connect(server.local_addr()).await;
        let mut reader = TestClient::connect(server.local_addr()).await;

        assert_eq!(writer.send("SET color deep blue").await, "OK");
        assert_eq!(reader.send("GET color").await, "deep blue");
        assert_eq!(server.storage().get("color").as_deref(), Some("deep blue"));
    }

    #[tokio::test]
    async fn test_repeated_set_then_get() {
        let (server, _cancel) = start_test_server().await;
        let mut client = TestClient::connect(server.local_addr()).await;

        for _ in 0..10 {
            assert_eq!(client.send("SET k v").await, "OK");
        }
        assert_eq!(client.send("GET k").await, "v");
        assert_eq!(client.send("GET k").await, "v");
    }

    #[tokio::test]
    async fn test_crlf_input_is_tolerated() {
        let (server, _cancel) = start_test_server().await;
        let mut client = TestClient::connect(server.local_addr()).await;

        client.writer.write_all(b"SET k v\r\nGET k\r\n").await.unwrap();

        let mut reply = String::new();
        client.reader.read_line(&mut reply).await.unwrap();
        assert_eq!(reply, "OK\n");
        reply.clear();
        client.reader.read_line(&mut reply).await.unwrap();
        assert_eq!(reply, "v\n");
    }

    #[tokio::test]
    async fn test_concurrent_clients_disjoint_keys() {
        const CLIENTS: usize = 16;
        const ROUNDS: usize = 50;

        let (server, _cancel) = start_test_server().await;
        let addr = server.local_addr();

        let tasks: Vec<_> = (0..CLIENTS)
            .map(|c| {
                tokio::spawn(async move {
                    let mut client = TestClient::connect(addr).await;
                    for r in 0..ROUNDS {
                        let key = format!("client{}:key{}", c, r % 5);
                        let value = format!("value-{}-{}", c, r);
                        assert_eq!(client.send(&format!("SET {} {}", key, value)).await, "OK");
                        assert_eq!(client.send(&format!("GET {}", key)).await, value);
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        // Last SET per key wins.
        for c in 0..CLIENTS {
            for k in 0..5 {
                let last_round = (ROUNDS - 5) + k;
                assert_eq!(
                    server.storage().get(&format!("client{}:key{}", c, k)),
                    Some(format!("value-{}-{}", c, last_round))
                );
            }
        }
        assert_eq!(
            server.stats().connections_accepted.load(Ordering::Relaxed),
            CLIENTS as u64
        );
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let (server, _cancel) = start_test_server().await;
        let taken = server.local_addr().to_string();

        let result = start(&taken, CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_invalid_address_is_a_bind_error() {
        let result = start("not an address", CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_cancellation_stops_accepting() {
        let (server, cancel) = start_test_server().await;
        let addr = server.local_addr();

        let mut client = TestClient::connect(addr).await;
        assert_eq!(client.send("SET k v").await, "OK");

        cancel.cancel();
        assert!(server.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), server.wait())
            .await
            .expect("accept loop should return after cancellation");

        assert!(TcpStream::connect(addr).await.is_err());

        // The open connection is not torn down by shutdown.
        assert_eq!(client.send("GET k").await, "v");
        assert_eq!(client.send("PING").await, "PONG");
    }

    #[tokio::test]
    async fn test_stop_via_handle() {
        let (server, cancel) = start_test_server().await;

        server.stop();
        assert!(cancel.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), server.wait())
            .await
            .expect("accept loop should return after stop");
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let server = start("127.0.0.1:0", cancel).await.unwrap();
        let addr = server.local_addr();
        server.wait().await;

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_shared_storage() {
        let storage: Arc<dyn Store> = Arc::new(StorageEngine::new());
        storage.set("preloaded".to_string(), "yes".to_string());

        let cancel = CancellationToken::new();
        let server = start_with_storage("127.0.0.1:0", cancel.clone(), storage)
            .await
            .unwrap();

        let mut client = TestClient::connect(server.local_addr()).await;
        assert_eq!(client.send("GET preloaded").await, "yes");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_accept_backoff_waits() {
        let cancel = CancellationToken::new();
        let started = std::time::Instant::now();

        assert!(backoff(&cancel).await);
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }

    #[tokio::test]
    async fn test_accept_backoff_ends_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let finished = tokio::time::timeout(ACCEPT_ERROR_BACKOFF / 2, backoff(&cancel)).await;
        assert_eq!(finished, Ok(false));
    }
}
