//! TCP client for the command protocol.
//!
//! Used by `homehubd request` and by integration tests. The client sends one
//! [`Request`] per line and reads one [`Response`] per line.
//!
//! # Example Usage
//!
//! ```no_run
//! use homehub_network::{CommandClient, CommandClientConfig, Request};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CommandClientConfig {
//!     server_addr: "127.0.0.1:9998".parse()?,
//!     timeout: Duration::from_millis(3000),
//! };
//!
//! let mut client = CommandClient::new(config);
//! client.connect().await?;
//!
//! let response = client.request(&Request::set("light_livingroom", "on")).await?;
//! println!("Received: {:?}", response);
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Timeout Handling
//!
//! Connect, send and receive each have the configured timeout (default
//! 3000ms). Timeouts are returned to the caller; the client never retries.

use crate::protocol::{Request, Response};
use futures::{SinkExt, StreamExt};
use homehub_core::constants::DEFAULT_COMMAND_PORT;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, trace, warn};

/// Configuration for the command client
///
/// # Example
///
/// ```
/// use homehub_network::CommandClientConfig;
/// use std::time::Duration;
///
/// let config = CommandClientConfig {
///     server_addr: "127.0.0.1:9998".parse().unwrap(),
///     timeout: Duration::from_millis(5000),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,

    /// Timeout for all I/O operations (connect, send, recv)
    pub timeout: Duration,
}

impl Default for CommandClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_COMMAND_PORT)),
            timeout: Duration::from_millis(3000),
        }
    }
}

/// Errors that can occur during command client operations
#[derive(Debug, Error)]
pub enum CommandClientError {
    /// Client is not connected to server
    #[error("Not connected to server")]
    NotConnected,

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Read operation timed out
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Response line was not valid JSON
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error
    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<LinesCodecError> for CommandClientError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::Io(e) => Self::Io(e),
            other => Self::Codec(other.to_string()),
        }
    }
}

/// Line-oriented client for the command server
pub struct CommandClient {
    /// Server address to connect to
    server_addr: SocketAddr,

    /// Framed TCP stream (None if not connected)
    framed: Option<Framed<TcpStream, LinesCodec>>,

    /// Timeout for all I/O operations
    timeout: Duration,
}

impl CommandClient {
    /// Create a new client; it is not connected until `connect()` is called
    ///
    /// # Example
    ///
    /// ```
    /// use homehub_network::{CommandClient, CommandClientConfig};
    ///
    /// let client = CommandClient::new(CommandClientConfig::default());
    /// assert!(!client.is_connected());
    /// ```
    pub fn new(config: CommandClientConfig) -> Self {
        debug!("Creating command client for server {}", config.server_addr);

        Self {
            server_addr: config.server_addr,
            framed: None,
            timeout: config.timeout,
        }
    }

    /// Connect to the command server
    ///
    /// # Errors
    ///
    /// Returns an error if the connection times out or is refused.
    pub async fn connect(&mut self) -> Result<(), CommandClientError> {
        info!("Connecting to server at {}", self.server_addr);

        let stream =
            match tokio::time::timeout(self.timeout, TcpStream::connect(self.server_addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    error!("Connection failed: {}", e);
                    return Err(e.into());
                }
                Err(_) => {
                    warn!("Connection timeout after {}ms", self.timeout.as_millis());
                    return Err(CommandClientError::ConnectionTimeout(
                        homehub_core::duration_ms(self.timeout),
                    ));
                }
            };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(stream, LinesCodec::new()));
        debug!("Client connected and ready");
        Ok(())
    }

    /// Send one request line
    ///
    /// # Errors
    ///
    /// Returns an error if not connected, on timeout or on I/O failure.
    pub async fn send(&mut self, request: &Request) -> Result<(), CommandClientError> {
        let line = serde_json::to_string(request)?;
        trace!(request = %line, "Sending request");

        let framed = self.framed.as_mut().ok_or(CommandClientError::NotConnected)?;
        match tokio::time::timeout(self.timeout, framed.send(line)).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(CommandClientError::WriteTimeout(
                homehub_core::duration_ms(self.timeout)
            )),
        }
    }

    /// Receive one response line
    ///
    /// # Errors
    ///
    /// Returns an error if not connected, on timeout, if the server closed
    /// the connection or if the line is not a valid response.
    pub async fn recv(&mut self) -> Result<Response, CommandClientError> {
        let framed = self.framed.as_mut().ok_or(CommandClientError::NotConnected)?;

        match tokio::time::timeout(self.timeout, framed.next()).await {
            Ok(Some(Ok(line))) => {
                trace!(response = %line, "Received response");
                Ok(serde_json::from_str(&line)?)
            }
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(None) => Err(CommandClientError::ConnectionLost(
                "Server closed connection".to_string(),
            )),
            Err(_) => Err(CommandClientError::ReadTimeout(
                homehub_core::duration_ms(self.timeout)
            )),
        }
    }

    /// Send a request and wait for its response
    ///
    /// # Errors
    ///
    /// See [`CommandClient::send`] and [`CommandClient::recv`].
    pub async fn request(&mut self, request: &Request) -> Result<Response, CommandClientError> {
        self.send(request).await?;
        self.recv().await
    }

    /// Check if client is connected to server
    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Close the connection gracefully; calling it twice is safe
    ///
    /// # Errors
    ///
    /// Never fails at the moment; flush and shutdown problems are logged.
    pub async fn close(&mut self) -> Result<(), CommandClientError> {
        if let Some(mut framed) = self.framed.take() {
            let grace = Duration::from_millis(500);
            match tokio::time::timeout(grace, SinkExt::<String>::flush(&mut framed)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!("Flush timeout during close ({}ms)", grace.as_millis()),
            }

            let mut stream = framed.into_inner();
            match tokio::time::timeout(grace, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!("Shutdown timeout during close ({}ms)", grace.as_millis()),
            }
            debug!("Connection closed");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CommandClientConfig::default();
        assert_eq!(config.server_addr.port(), 9998);
        assert_eq!(config.timeout.as_millis(), 3000);
    }

    #[tokio::test]
    async fn test_send_without_connect() {
        let mut client = CommandClient::new(CommandClientConfig::default());
        let result = client.send(&Request::new("ping")).await;
        assert!(matches!(result, Err(CommandClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_recv_without_connect() {
        let mut client = CommandClient::new(CommandClientConfig::default());
        let result = client.recv().await;
        assert!(matches!(result, Err(CommandClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_multiple_close_calls() {
        let mut client = CommandClient::new(CommandClientConfig::default());
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(!client.is_connected());
    }
}
