//! Building blocks of the `homehubd` daemon.
//!
//! The binary wires these activities around one shared
//! [`DeviceCoordinator`](homehub_coordinator::DeviceCoordinator) and hands
//! them to the [`LifecycleManager`](homehub_coordinator::LifecycleManager):
//!
//! - [`console`]: interactive operator console on stdin/stdout
//! - [`poller`]: periodic device reads and the log consumer behind them
//! - [`scheduler`]: timed `set`/`read`/`toggle` jobs
//! - [`signals`]: `SIGINT`/`SIGTERM` listener
//!
//! [`config`] loads `homehub.toml` and builds the HAL backend.

pub mod config;
pub mod console;
pub mod error;
pub mod poller;
pub mod scheduler;
pub mod signals;

pub use config::{Config, ConfigError};
pub use error::{ActivityError, Result};
