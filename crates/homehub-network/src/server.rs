//! TCP command server.
//!
//! Accepts many concurrent client sessions. Each session reads JSON request
//! lines, runs them against the shared [`DeviceCoordinator`] and writes one
//! JSON response line per request.
//!
//! # Architecture
//!
//! ```text
//! client A ┐
//!          │
//! client B ├──> CommandServer ──> session task (LinesCodec) ──> DeviceCoordinator
//!          │
//! client C ┘
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use homehub_coordinator::{CoordinatorConfig, DeviceCoordinator, ShutdownSignal};
//! use homehub_hal::MockHal;
//! use homehub_network::{CommandServer, CommandServerConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = ShutdownSignal::new();
//! let (hal, _handle) = MockHal::new();
//! let coordinator =
//!     Arc::new(DeviceCoordinator::new(hal, CoordinatorConfig::default(), shutdown.clone()).await?);
//!
//! let server = CommandServer::bind(CommandServerConfig::default(), coordinator).await?;
//! server.run(shutdown).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design Principles
//!
//! - **No authentication**: the server is meant for a trusted home network
//! - **Bounded sessions**: clients over `max_connections` receive an error
//!   line and are disconnected
//! - **Bounded lines**: over-long request lines are answered with an error
//!   and skipped, the session stays open

use crate::handler::handle_line;
use crate::protocol::Response;
use futures::{SinkExt, StreamExt};
use homehub_coordinator::{DeviceCoordinator, ShutdownSignal};
use homehub_core::constants::{DEFAULT_COMMAND_PORT, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_LINE_LENGTH};
use homehub_hal::DeviceHal;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, trace, warn};

/// Time allowed to write the rejection line to a client over the limit.
const REJECT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for the command server
///
/// # Example
///
/// ```
/// use homehub_network::CommandServerConfig;
///
/// let config = CommandServerConfig {
///     bind_addr: "127.0.0.1:9998".parse().unwrap(),
///     max_connections: 8,
///     max_line_length: 4096,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,

    /// Maximum number of simultaneous sessions
    pub max_connections: usize,

    /// Longest accepted request line, in bytes
    pub max_line_length: usize,
}

impl Default for CommandServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_COMMAND_PORT)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Errors that can occur during command server operations
#[derive(Debug, Error)]
pub enum CommandServerError {
    /// Failed to bind to address
    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Line framing error
    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<LinesCodecError> for CommandServerError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::Io(e) => Self::Io(e),
            other => Self::Codec(other.to_string()),
        }
    }
}

/// JSON-lines command server in front of a [`DeviceCoordinator`].
pub struct CommandServer<H> {
    /// TCP listener for accepting new connections
    listener: TcpListener,

    /// Coordinator shared by every session
    coordinator: Arc<DeviceCoordinator<H>>,

    /// Server configuration
    config: CommandServerConfig,
}

impl<H: DeviceHal> CommandServer<H> {
    /// Bind the server to the configured address
    ///
    /// # Errors
    ///
    /// Returns `CommandServerError::BindFailed` if the address is in use or
    /// not permitted.
    pub async fn bind(
        config: CommandServerConfig,
        coordinator: Arc<DeviceCoordinator<H>>,
    ) -> Result<Self, CommandServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| CommandServerError::BindFailed {
                addr: config.bind_addr,
                source,
            })?;

        info!(
            addr = %listener.local_addr()?,
            max_connections = config.max_connections,
            "Command server listening"
        );

        Ok(Self {
            listener,
            coordinator,
            config,
        })
    }

    /// Address the server is actually bound to
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, CommandServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept sessions until shutdown is requested
    ///
    /// Once the signal fires, the listener is closed and every session ends
    /// after the response it is currently writing.
    ///
    /// # Errors
    ///
    /// Returns an error only if accepting connections fails permanently.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), CommandServerError> {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    log_session_end(joined);
                }

                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    if sessions.len() >= self.config.max_connections {
                        error!(
                            addr = %addr,
                            max_connections = self.config.max_connections,
                            "Connection rejected: maximum connections reached"
                        );
                        reject(stream, self.config.max_connections).await;
                        continue;
                    }

                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
                    }

                    debug!(addr = %addr, sessions = sessions.len() + 1, "Client connected");
                    sessions.spawn(session(
                        stream,
                        addr,
                        Arc::clone(&self.coordinator),
                        shutdown.clone(),
                        self.config.max_line_length,
                    ));
                }
            }
        }

        drop(self.listener);
        info!(open_sessions = sessions.len(), "Command server stopping");
        while let Some(joined) = sessions.join_next().await {
            log_session_end(joined);
        }
        info!("Command server stopped");
        Ok(())
    }
}

/// Serve one client until it disconnects or shutdown is requested.
async fn session<H: DeviceHal>(
    stream: TcpStream,
    addr: SocketAddr,
    coordinator: Arc<DeviceCoordinator<H>>,
    shutdown: ShutdownSignal,
    max_line_length: usize,
) -> Result<SocketAddr, CommandServerError> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(max_line_length));

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = framed.next() => next,
        };

        let response = match next {
            None => break,
            Some(Ok(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                trace!(addr = %addr, request = %line, "Received request");
                handle_line(&coordinator, line).await
            }
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                warn!(addr = %addr, max_line_length, "Request line too long");
                Response::error(format!("request line exceeds {max_line_length} bytes"))
            }
            Some(Err(e)) => return Err(e.into()),
        };

        let encoded = serde_json::to_string(&response)?;
        trace!(addr = %addr, response = %encoded, "Sending response");
        framed.send(encoded).await?;
    }

    Ok(addr)
}

/// Tell a client over the session limit why it is being dropped.
async fn reject(mut stream: TcpStream, max_connections: usize) {
    let response = Response::error(format!(
        "server busy: maximum of {max_connections} connections reached"
    ));
    let Ok(mut line) = serde_json::to_string(&response) else {
        return;
    };
    line.push('\n');

    let write = async {
        stream.write_all(line.as_bytes()).await?;
        stream.shutdown().await
    };
    if let Err(e) = tokio::time::timeout(REJECT_WRITE_TIMEOUT, write)
        .await
        .unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into()))
    {
        debug!(error = %e, "Failed to notify rejected client");
    }
}

/// Classify the termination status of a session task.
fn log_session_end(joined: Result<Result<SocketAddr, CommandServerError>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(addr)) => debug!(addr = %addr, "Client disconnected"),
        Ok(Err(e)) => warn!(error = %e, "Session ended with error"),
        Err(e) if e.is_cancelled() => debug!("Session cancelled"),
        Err(e) => error!(error = %e, "Session panicked"),
    }
}
