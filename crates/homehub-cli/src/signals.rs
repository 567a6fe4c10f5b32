//! OS termination signal listener.

use crate::error::Result;
use homehub_coordinator::{ShutdownReason, ShutdownSignal};
use tracing::info;

/// Wait for `SIGINT` or `SIGTERM` and turn it into a shutdown request.
///
/// Returns once shutdown has been triggered, by a signal or by anyone else.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn listen(shutdown: ShutdownSignal) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = shutdown.cancelled() => return Ok(()),
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    info!(signal = name, "Termination signal received");
    shutdown.trigger(ShutdownReason::OsSignal(name));
    Ok(())
}

/// Wait for Ctrl+C and turn it into a shutdown request.
///
/// # Errors
///
/// Returns an error if the handler cannot be installed.
#[cfg(not(unix))]
pub async fn listen(shutdown: ShutdownSignal) -> Result<()> {
    tokio::select! {
        _ = shutdown.cancelled() => return Ok(()),
        result = tokio::signal::ctrl_c() => result?,
    }
    info!(signal = "ctrl-c", "Termination signal received");
    shutdown.trigger(ShutdownReason::OsSignal("SIGINT"));
    Ok(())
}
