use homehub_network::CommandServerError;
use thiserror::Error;

/// Failure of a long-running activity of the daemon.
#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command server error: {0}")]
    Server(#[from] CommandServerError),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),
}

pub type Result<T> = std::result::Result<T, ActivityError>;
