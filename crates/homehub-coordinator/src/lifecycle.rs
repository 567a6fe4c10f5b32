//! Activity lifecycle management.
//!
//! The [`LifecycleManager`] owns the [`ShutdownSignal`] and every long-running
//! activity of the hub (poller, command server, console, scheduler). It moves
//! through four phases:
//!
//! ```text
//! Initializing ──► Running ──► ShuttingDown ──► Stopped
//! ```
//!
//! Activities never stop each other. Any of them may trigger the shared
//! signal; the manager then waits for every activity, each with its own stop
//! timeout, and aborts the ones that overrun.
//!
//! # Examples
//!
//! ```
//! use homehub_coordinator::{LifecycleManager, ShutdownReason, ShutdownSignal};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut lifecycle = LifecycleManager::new(ShutdownSignal::new());
//!
//!     lifecycle.spawn("worker", Duration::from_secs(1), |shutdown| async move {
//!         shutdown.cancelled().await;
//!         Ok::<(), std::io::Error>(())
//!     });
//!     lifecycle.signal().trigger(ShutdownReason::Requested);
//!
//!     let report = lifecycle.run().await;
//!     assert!(report.is_clean());
//!     assert_eq!(report.exit_code(), 0);
//! }
//! ```

use crate::signal::{ShutdownReason, ShutdownSignal};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Exit code for a clean stop.
pub const EXIT_CLEAN: i32 = 0;
/// Exit code when an activity failed or had to be aborted.
pub const EXIT_FORCED: i32 = 1;
/// Exit code when the hub could not be initialized.
pub const EXIT_FATAL_INIT: i32 = 2;

/// Lifecycle phase of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// How an activity ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Returned `Ok`.
    Clean,
    /// Returned an error.
    Failed(String),
    /// Panicked.
    Panicked(String),
    /// Did not stop within its timeout and was aborted.
    TimedOut,
}

impl fmt::Display for ActivityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Outcome of one activity at shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityReport {
    pub name: String,
    pub outcome: ActivityOutcome,
    /// Time between the start of shutdown and the activity ending.
    pub stop_time: Duration,
}

/// Summary of a completed shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Reason recorded by whoever triggered shutdown first.
    pub reason: Option<ShutdownReason>,
    /// Activities in spawn order.
    pub activities: Vec<ActivityReport>,
}

impl ShutdownReport {
    /// Whether shutdown was orderly and every activity stopped cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.reason.as_ref().is_none_or(ShutdownReason::is_orderly)
            && self
                .activities
                .iter()
                .all(|a| a.outcome == ActivityOutcome::Clean)
    }

    /// Process exit code for this report.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            EXIT_CLEAN
        } else {
            EXIT_FORCED
        }
    }
}

struct Activity {
    name: String,
    stop_timeout: Duration,
    handle: JoinHandle<ActivityOutcome>,
}

/// Starts activities and stops them in bounded time.
pub struct LifecycleManager {
    shutdown: ShutdownSignal,
    phase: watch::Sender<Phase>,
    activities: Vec<Activity>,
}

impl LifecycleManager {
    /// Create a manager in the `Initializing` phase.
    pub fn new(shutdown: ShutdownSignal) -> Self {
        let (phase, _) = watch::channel(Phase::Initializing);
        Self {
            shutdown,
            phase,
            activities: Vec::new(),
        }
    }

    /// The shared shutdown signal.
    pub fn signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Number of spawned activities.
    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    /// Spawn an activity.
    ///
    /// The closure receives a clone of the shutdown signal and must return
    /// once it fires. An activity that errors, panics or returns before
    /// shutdown triggers shutdown for everyone.
    pub fn spawn<F, Fut, E>(&mut self, name: impl Into<String>, stop_timeout: Duration, activity: F)
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let name = name.into();
        let signal = self.shutdown.clone();
        let future = activity(signal.clone());
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => {
                    if !signal.is_triggered() {
                        warn!(activity = %task_name, "Activity exited before shutdown");
                        signal.trigger(ShutdownReason::ActivityExited(task_name));
                    }
                    ActivityOutcome::Clean
                }
                Ok(Err(e)) => {
                    error!(activity = %task_name, error = %e, "Activity failed");
                    signal.trigger(ShutdownReason::ActivityFailed(task_name));
                    ActivityOutcome::Failed(e.to_string())
                }
                Err(payload) => {
                    let message = panic_message(&*payload);
                    error!(activity = %task_name, panic = %message, "Activity panicked");
                    signal.trigger(ShutdownReason::ActivityFailed(task_name));
                    ActivityOutcome::Panicked(message)
                }
            }
        });

        info!(activity = %name, "Activity started");
        self.activities.push(Activity {
            name,
            stop_timeout,
            handle,
        });
    }

    /// Enter `Running`, wait for the shutdown signal, then stop everything.
    pub async fn run(self) -> ShutdownReport {
        self.phase.send_replace(Phase::Running);
        info!(activities = self.activities.len(), "Hub running");
        self.shutdown.cancelled().await;
        self.stop().await
    }

    /// Trigger shutdown if nobody has, and wait for every activity.
    ///
    /// Activities are awaited concurrently, each bounded by its own stop
    /// timeout. Overrunning activities are logged and aborted; they do not
    /// delay the others.
    pub async fn stop(self) -> ShutdownReport {
        self.shutdown.trigger(ShutdownReason::Requested);
        self.phase.send_replace(Phase::ShuttingDown);
        let started = Instant::now();

        let waits = self.activities.into_iter().map(|activity| async move {
            let Activity {
                name,
                stop_timeout,
                mut handle,
            } = activity;

            let outcome = match tokio::time::timeout(stop_timeout, &mut handle).await {
                Ok(joined) => classify_task_result(joined),
                Err(_) => {
                    warn!(
                        activity = %name,
                        timeout_ms = homehub_core::duration_ms(stop_timeout),
                        "Activity did not stop in time, aborting"
                    );
                    handle.abort();
                    ActivityOutcome::TimedOut
                }
            };
            info!(activity = %name, outcome = %outcome, "Activity stopped");
            ActivityReport {
                name,
                outcome,
                stop_time: started.elapsed(),
            }
        });
        let activities = futures::future::join_all(waits).await;

        self.phase.send_replace(Phase::Stopped);
        let report = ShutdownReport {
            reason: self.shutdown.reason(),
            activities,
        };
        info!(clean = report.is_clean(), exit_code = report.exit_code(), "Hub stopped");
        report
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("phase", &self.phase())
            .field("activities", &self.activities.len())
            .finish()
    }
}

/// Classify the termination status of an activity task.
fn classify_task_result(result: Result<ActivityOutcome, JoinError>) -> ActivityOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => ActivityOutcome::TimedOut,
        Err(e) => ActivityOutcome::Panicked(panic_message(&*e.into_panic())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manager_is_initializing() {
        let lifecycle = LifecycleManager::new(ShutdownSignal::new());
        assert_eq!(lifecycle.phase(), Phase::Initializing);
        assert_eq!(lifecycle.activity_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_activities() {
        let lifecycle = LifecycleManager::new(ShutdownSignal::new());
        let phases = lifecycle.subscribe();
        let report = lifecycle.stop().await;

        assert_eq!(report.reason, Some(ShutdownReason::Requested));
        assert!(report.activities.is_empty());
        assert_eq!(report.exit_code(), EXIT_CLEAN);
        assert_eq!(*phases.borrow(), Phase::Stopped);
    }

    #[tokio::test]
    async fn test_failing_activity_triggers_shutdown() {
        let mut lifecycle = LifecycleManager::new(ShutdownSignal::new());
        lifecycle.spawn("idle", Duration::from_secs(1), |shutdown| async move {
            shutdown.cancelled().await;
            Ok::<(), String>(())
        });
        lifecycle.spawn("broken", Duration::from_secs(1), |_| async move {
            Err::<(), String>("bind failed".to_string())
        });

        let report = lifecycle.run().await;
        assert_eq!(
            report.reason,
            Some(ShutdownReason::ActivityFailed("broken".into()))
        );
        assert_eq!(report.activities[0].outcome, ActivityOutcome::Clean);
        assert_eq!(
            report.activities[1].outcome,
            ActivityOutcome::Failed("bind failed".into())
        );
        assert_eq!(report.exit_code(), EXIT_FORCED);
    }

    #[tokio::test]
    async fn test_panicking_activity_is_contained() {
        let mut lifecycle = LifecycleManager::new(ShutdownSignal::new());
        lifecycle.spawn("panicky", Duration::from_secs(1), |_| async move {
            if true {
                panic!("sensor table corrupt");
            }
            Ok::<(), String>(())
        });

        let report = lifecycle.run().await;
        assert_eq!(
            report.activities[0].outcome,
            ActivityOutcome::Panicked("sensor table corrupt".into())
        );
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_early_exit_triggers_shutdown() {
        let mut lifecycle = LifecycleManager::new(ShutdownSignal::new());
        lifecycle.spawn("short", Duration::from_secs(1), |_| async move {
            Ok::<(), String>(())
        });

        let report = lifecycle.run().await;
        assert_eq!(
            report.reason,
            Some(ShutdownReason::ActivityExited("short".into()))
        );
        assert_eq!(report.exit_code(), EXIT_FORCED);
    }

    #[test]
    fn test_report_clean_when_orderly() {
        let report = ShutdownReport {
            reason: Some(ShutdownReason::OsSignal("SIGTERM")),
            activities: vec![ActivityReport {
                name: "poller".into(),
                outcome: ActivityOutcome::Clean,
                stop_time: Duration::from_millis(3),
            }],
        };
        assert!(report.is_clean());

        let forced = ShutdownReport {
            activities: vec![ActivityReport {
                name: "console".into(),
                outcome: ActivityOutcome::TimedOut,
                stop_time: Duration::from_secs(2),
            }],
            ..report
        };
        assert_eq!(forced.exit_code(), EXIT_FORCED);
    }
}
