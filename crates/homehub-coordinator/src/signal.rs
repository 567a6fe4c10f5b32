//! Process-wide shutdown signal.
//!
//! A [`ShutdownSignal`] is handed to every activity when it is spawned. It is
//! unset at startup, set at most once, and never reset. Whoever sets it first
//! records the [`ShutdownReason`]; later calls are no-ops.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

/// Why shutdown was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The process received a termination signal (`SIGINT`, `SIGTERM`).
    OsSignal(&'static str),
    /// The operator typed `exit` on the console (or closed stdin).
    ConsoleExit,
    /// An activity returned an error or panicked.
    ActivityFailed(String),
    /// An activity returned before shutdown was requested.
    ActivityExited(String),
    /// Shutdown was requested programmatically.
    Requested,
}

impl ShutdownReason {
    /// Whether this reason counts as an orderly stop.
    #[must_use]
    pub fn is_orderly(&self) -> bool {
        matches!(self, Self::OsSignal(_) | Self::ConsoleExit | Self::Requested)
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OsSignal(name) => write!(f, "received {name}"),
            Self::ConsoleExit => f.write_str("console exit"),
            Self::ActivityFailed(name) => write!(f, "activity {name} failed"),
            Self::ActivityExited(name) => write!(f, "activity {name} exited"),
            Self::Requested => f.write_str("requested"),
        }
    }
}

/// Cloneable, one-way shutdown flag.
///
/// # Examples
///
/// ```
/// use homehub_coordinator::{ShutdownReason, ShutdownSignal};
///
/// let signal = ShutdownSignal::new();
/// let observer = signal.clone();
///
/// assert!(signal.trigger(ShutdownReason::ConsoleExit));
/// assert!(!observer.trigger(ShutdownReason::Requested));
/// assert!(observer.is_triggered());
/// assert_eq!(observer.reason(), Some(ShutdownReason::ConsoleExit));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    ///
    /// Returns `true` for the call that actually set the signal.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason.clone()).is_ok();
        if first {
            info!(reason = %reason, "Shutdown requested");
        }
        self.token.cancel();
        first
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason recorded by the first trigger.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().cloned()
    }

    /// Wait until shutdown is requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `false` if the sleep was cut short by shutdown.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
