use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Identifier errors
    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),

    // Value errors
    #[error("Invalid switch value: {0}")]
    InvalidSwitchValue(String),
}

pub type Result<T> = std::result::Result<T, Error>;
