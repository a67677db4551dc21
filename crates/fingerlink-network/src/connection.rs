//! Connection manager for the server link.
//!
//! This module owns the persistent line-oriented stream to the server.
//! It connects with unbounded retry, exchanges [`Outbound`] messages and
//! raw lines through the [`LineCodec`], and closes the stream gracefully.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher
//!     │
//!     └─> ConnectionManager ──(Connector: TCP)──> Server
//!             │
//!             └─> LineCodec (newline framing)
//! ```
//!
//! # Connection States
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──success──> Connected
//!      ^                          │  ^                    │
//!      │                          └──┘ retry              │
//!      └──────── disconnect() / read or write failure ────┘
//! ```
//!
//! Any read or write failure drops the stream and moves the manager to
//! `Disconnected`. Callers never see a half-open connection. A malformed
//! line (too long, not UTF-8) is discarded and the stream kept.
//!
//! # Timeout Handling
//!
//! - Connect: per attempt ([`ConnectionConfig::connect_timeout`])
//! - Send: [`ConnectionConfig::write_timeout`]
//! - Awaited lines: [`ConnectionConfig::feedback_timeout`]; a read timeout
//!   keeps the connection open
//!
//! # Example Usage
//!
//! ```no_run
//! use fingerlink_network::{ConnectionConfig, ConnectionManager};
//! use fingerlink_protocol::Outbound;
//! use fingerlink_core::FingerId;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut connection = ConnectionManager::new(ConnectionConfig::default());
//! connection.connect(&CancellationToken::new()).await?;
//!
//! connection.send(Outbound::ScanFinger(FingerId::new(42)?)).await?;
//! let feedback = connection.recv_feedback().await?;
//! println!("Server said: {feedback}");
//!
//! connection.disconnect().await;
//! # Ok(())
//! # }
//! ```

use futures::{FutureExt, SinkExt, StreamExt};
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use fingerlink_core::constants::{
    CONNECT_RETRY_INTERVAL_MS, CONNECT_TIMEOUT_MS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
    FEEDBACK_TIMEOUT_MS, WRITE_TIMEOUT_MS,
};
use fingerlink_protocol::{LineCodec, Outbound};

/// Flush/shutdown limit when closing the stream.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for the connection manager
///
/// # Example
///
/// ```
/// use fingerlink_network::ConnectionConfig;
/// use std::time::Duration;
///
/// let config = ConnectionConfig {
///     server_addr: "10.0.0.5:5050".to_string(),
///     retry_interval: Duration::from_millis(500),
///     ..ConnectionConfig::default()
/// };
/// assert_eq!(config.feedback_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address as `host:port`
    pub server_addr: String,

    /// Timeout of a single connection attempt
    pub connect_timeout: Duration,

    /// Pause between connection attempts
    pub retry_interval: Duration,

    /// Timeout for sending one message
    pub write_timeout: Duration,

    /// Timeout for every awaited server line
    pub feedback_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("{DEFAULT_SERVER_HOST}:{DEFAULT_SERVER_PORT}"),
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
            retry_interval: Duration::from_millis(CONNECT_RETRY_INTERVAL_MS),
            write_timeout: Duration::from_millis(WRITE_TIMEOUT_MS),
            feedback_timeout: Duration::from_millis(FEEDBACK_TIMEOUT_MS),
        }
    }
}

/// Link state as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Errors that can occur during connection operations
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No stream is open
    #[error("Not connected to server")]
    NotConnected,

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Read operation timed out; the connection stays open
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Waiting was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// Protocol-level error from the codec
    #[error("Protocol error: {0}")]
    Protocol(#[from] fingerlink_core::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    /// Whether the stream is gone after this error.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionLost(_) | Self::WriteTimeout(_)
        )
    }
}

/// Opens streams to the server.
///
/// The production implementation is [`TcpConnector`]; tests plug in
/// in-memory streams.
pub trait Connector: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open one stream to `addr`.
    async fn connect(&mut self, addr: &str) -> io::Result<Self::Stream>;
}

/// TCP connector with `TCP_NODELAY` set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self, addr: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;

        // Lines are tiny and latency-sensitive (a user waits on the display).
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        Ok(stream)
    }
}

/// Owner of the server stream.
///
/// # Thread Safety
///
/// The manager is the single reader and single writer of the stream. It is
/// driven from one task; messages are written whole, so lines of two
/// messages never interleave.
pub struct ConnectionManager<C: Connector = TcpConnector> {
    /// Opens new streams
    connector: C,

    /// Framed stream (None if not connected)
    framed: Option<Framed<C::Stream, LineCodec>>,

    /// Current link state
    state: ConnectionState,

    config: ConnectionConfig,
}

impl ConnectionManager<TcpConnector> {
    /// Create a TCP connection manager.
    ///
    /// The manager is `Disconnected` after creation.
    ///
    /// # Example
    ///
    /// ```
    /// use fingerlink_network::{ConnectionConfig, ConnectionManager, ConnectionState};
    ///
    /// let connection = ConnectionManager::new(ConnectionConfig::default());
    /// assert_eq!(connection.state(), ConnectionState::Disconnected);
    /// ```
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager that opens streams through `connector`.
    pub fn with_connector(config: ConnectionConfig, connector: C) -> Self {
        debug!("Creating connection manager for server {}", config.server_addr);

        Self {
            connector,
            framed: None,
            state: ConnectionState::Disconnected,
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Make one connection attempt and send the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt times out, is refused, or the
    /// greeting cannot be written.
    pub async fn try_connect(&mut self) -> Result<(), ConnectionError> {
        let addr = self.config.server_addr.clone();
        info!("Connecting to server at {}", addr);

        let stream = match tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(&addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!("Connection attempt failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                let ms = self.config.connect_timeout.as_millis() as u64;
                debug!("Connection attempt timed out after {}ms", ms);
                return Err(ConnectionError::ConnectionTimeout(ms));
            }
        };

        self.framed = Some(Framed::new(stream, LineCodec::new()));
        self.state = ConnectionState::Connected;
        self.send(Outbound::Greeting).await?;

        info!("Connected to {}", addr);
        Ok(())
    }

    /// Connect, retrying at the configured interval until it succeeds.
    ///
    /// Returns the number of attempts made. The state is `Connecting`
    /// for the whole retry loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Cancelled`] if `cancel` fires between
    /// attempts. No other error ends the loop.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<u32, ConnectionError> {
        if self.is_connected() {
            return Ok(0);
        }

        let mut attempts = 0u32;
        loop {
            self.state = ConnectionState::Connecting;
            attempts += 1;

            match self.try_connect().await {
                Ok(()) => return Ok(attempts),
                Err(e) => {
                    trace!(attempt = attempts, "Connect failed: {}", e);
                    self.state = ConnectionState::Connecting;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("Connect cancelled after {} attempts", attempts);
                    self.state = ConnectionState::Disconnected;
                    return Err(ConnectionError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.retry_interval) => {}
            }
        }
    }

    /// Send a message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] without a stream. Any write
    /// failure or timeout drops the stream.
    pub async fn send(&mut self, message: Outbound) -> Result<(), ConnectionError> {
        trace!(kind = message.kind(), "Sending message to server");

        let framed = self.framed.as_mut().ok_or(ConnectionError::NotConnected)?;

        match tokio::time::timeout(self.config.write_timeout, framed.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(fingerlink_core::Error::Io(e))) => {
                error!("Failed to send message: {}", e);
                self.drop_stream("write failed");
                Err(ConnectionError::ConnectionLost(e.to_string()))
            }
            Ok(Err(e)) => {
                // Encoding errors leave the stream intact.
                error!("Failed to encode message: {}", e);
                Err(ConnectionError::Protocol(e))
            }
            Err(_) => {
                let ms = self.config.write_timeout.as_millis() as u64;
                warn!("Send timeout after {}ms", ms);
                self.drop_stream("write timeout");
                Err(ConnectionError::WriteTimeout(ms))
            }
        }
    }

    /// Wait for one line, up to `timeout`.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::ReadTimeout`]: nothing arrived; the stream stays open
    /// - [`ConnectionError::ConnectionLost`]: the server closed the stream or
    ///   the read failed
    /// - [`ConnectionError::Protocol`]: the line was malformed and discarded;
    ///   the stream stays open
    pub async fn recv_line(&mut self, timeout: Duration) -> Result<String, ConnectionError> {
        let framed = self.framed.as_mut().ok_or(ConnectionError::NotConnected)?;

        match tokio::time::timeout(timeout, framed.next()).await {
            Ok(next) => self.handle_next(next),
            Err(_) => {
                let ms = timeout.as_millis() as u64;
                warn!("Receive timeout after {}ms", ms);
                Err(ConnectionError::ReadTimeout(ms))
            }
        }
    }

    /// Wait for one line with the configured feedback timeout.
    pub async fn recv_feedback(&mut self) -> Result<String, ConnectionError> {
        self.recv_line(self.config.feedback_timeout).await
    }

    /// Return a line if one is already buffered or readable, without waiting.
    ///
    /// # Errors
    ///
    /// Same as [`recv_line`](Self::recv_line), minus the timeout.
    pub fn poll_line(&mut self) -> Result<Option<String>, ConnectionError> {
        let framed = self.framed.as_mut().ok_or(ConnectionError::NotConnected)?;

        match framed.next().now_or_never() {
            None => Ok(None),
            Some(next) => self.handle_next(next).map(Some),
        }
    }

    fn handle_next(
        &mut self,
        next: Option<Result<String, fingerlink_core::Error>>,
    ) -> Result<String, ConnectionError> {
        match next {
            Some(Ok(line)) => {
                trace!(line = %line, "Received line from server");
                Ok(line)
            }
            Some(Err(fingerlink_core::Error::Io(e))) => {
                error!("Failed to read from server: {}", e);
                self.drop_stream("read failed");
                Err(ConnectionError::ConnectionLost(e.to_string()))
            }
            Some(Err(e)) => {
                // Framed stops yielding buffered lines after a decode error
                // until it is rebuilt from its parts.
                warn!("Discarding malformed line: {}", e);
                if let Some(framed) = self.framed.take() {
                    self.framed = Some(Framed::from_parts(framed.into_parts()));
                }
                Err(ConnectionError::Protocol(e))
            }
            None => {
                warn!("Connection closed by server");
                self.drop_stream("closed by server");
                Err(ConnectionError::ConnectionLost(
                    "Server closed connection".to_string(),
                ))
            }
        }
    }

    /// Close the connection gracefully.
    ///
    /// Sends the `disconnect` notice, flushes and shuts the stream down.
    /// Idempotent: without an open stream nothing is sent and `false` is
    /// returned.
    pub async fn disconnect(&mut self) -> bool {
        if self.framed.is_none() {
            self.state = ConnectionState::Disconnected;
            return false;
        }

        info!("Disconnecting from {}", self.config.server_addr);
        if let Err(e) = self.send(Outbound::Disconnect).await {
            warn!("Could not send disconnect notice: {}", e);
        }

        if let Some(mut framed) = self.framed.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, framed.flush()).await {
                Ok(Ok(())) => debug!("Flush completed successfully"),
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!("Flush timeout during close ({}ms)", CLOSE_TIMEOUT.as_millis()),
            }

            let mut stream = framed.into_inner();
            match tokio::time::timeout(CLOSE_TIMEOUT, stream.shutdown()).await {
                Ok(Ok(())) => debug!("Shutdown completed successfully"),
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!(
                    "Shutdown timeout during close ({}ms)",
                    CLOSE_TIMEOUT.as_millis()
                ),
            }
        }

        self.state = ConnectionState::Disconnected;
        info!("Disconnected from server");
        true
    }

    fn drop_stream(&mut self, reason: &str) {
        if self.framed.take().is_some() {
            warn!(reason, "Connection dropped");
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("ConnectionManager dropped while connected - connection will be closed");
        }
    }
}
