//! Bounded-concurrency access gate.
//!
//! Every HAL call holds a [`GatePermit`] for its whole duration. Permits are
//! owned, so one can move into the task running the call and return only when
//! the call has finished, whoever stopped waiting for it. The gate is
//! backed by a Tokio semaphore, which queues waiters in FIFO order, so a
//! waiter cannot be starved by later arrivals. Waiting is abandoned as soon as
//! the shutdown signal fires.

use crate::error::{CoordinatorError, Result};
use crate::signal::ShutdownSignal;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission pool of fixed capacity in front of the HAL.
#[derive(Debug)]
pub struct AccessGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    shutdown: ShutdownSignal,
}

/// Proof of admission; the unit returns to the gate when dropped.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl AccessGate {
    /// Create a gate admitting `capacity` concurrent operations.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::Config` if `capacity` is zero or above the
    /// semaphore limit.
    pub fn new(capacity: usize, shutdown: ShutdownSignal) -> Result<Self> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(CoordinatorError::Config(format!(
                "gate capacity must be between 1 and {}, got {capacity}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            shutdown,
        })
    }

    /// Wait for a unit of admission.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::ShuttingDown` if shutdown was requested
    /// before or while waiting.
    pub async fn acquire(&self) -> Result<GatePermit> {
        if self.shutdown.is_triggered() {
            return Err(CoordinatorError::ShuttingDown);
        }
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(CoordinatorError::ShuttingDown),
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit
                .map(|permit| GatePermit { _permit: permit })
                .map_err(|_| CoordinatorError::ShuttingDown),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ShutdownReason;
    use std::time::Duration;

    #[test]
    fn test_gate_rejects_zero_capacity() {
        let result = AccessGate::new(0, ShutdownSignal::new());
        assert!(matches!(result, Err(CoordinatorError::Config(_))));
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let gate = AccessGate::new(2, ShutdownSignal::new()).unwrap();
        {
            let _a = gate.acquire().await.unwrap();
            let _b = gate.acquire().await.unwrap();
            assert_eq!(gate.available(), 0);
        }
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_acquire_refused_after_shutdown() {
        let signal = ShutdownSignal::new();
        let gate = AccessGate::new(1, signal.clone()).unwrap();
        signal.trigger(ShutdownReason::Requested);

        assert!(matches!(
            gate.acquire().await,
            Err(CoordinatorError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_waiter_released_by_shutdown() {
        let signal = ShutdownSignal::new();
        let gate = Arc::new(AccessGate::new(1, signal.clone()).unwrap());
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        signal.trigger(ShutdownReason::Requested);

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(CoordinatorError::ShuttingDown));

        drop(held);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak() {
        let gate = AccessGate::new(1, ShutdownSignal::new()).unwrap();
        let held = gate.acquire().await.unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(10), gate.acquire()).await;
        assert!(timed_out.is_err());

        drop(held);
        assert_eq!(gate.available(), 1);
        assert!(gate.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_permit_moved_into_task_held_until_task_ends() {
        let gate = AccessGate::new(1, ShutdownSignal::new()).unwrap();
        let permit = gate.acquire().await.unwrap();
        let (release, released) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let _permit = permit;
            let _ = released.await;
        });
        assert_eq!(gate.available(), 0);

        release.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(gate.available(), 1);
    }
}
