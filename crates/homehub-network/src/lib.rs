//! Network front end for the home hub
//!
//! This crate exposes the device coordinator over TCP using a JSON-lines
//! protocol: one request object per line, one response object per line.
//!
//! # Components
//!
//! - **CommandServer**: accepts concurrent client sessions and runs their
//!   requests against a shared coordinator
//! - **CommandClient**: sends requests to a running server
//! - **protocol**: request, command and response types
//!
//! # Example
//!
//! ```no_run
//! use homehub_network::{CommandClient, CommandClientConfig, Request};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = CommandClient::new(CommandClientConfig::default());
//! client.connect().await?;
//! let pong = client.request(&Request::new("ping")).await?;
//! assert_eq!(pong.message.as_deref(), Some("pong"));
//! # Ok(())
//! # }
//! ```

mod client;
pub mod handler;
pub mod protocol;
mod server;

pub use client::{CommandClient, CommandClientConfig, CommandClientError};
pub use protocol::{Command, ProtocolError, Request, Response};
pub use server::{CommandServer, CommandServerConfig, CommandServerError};
