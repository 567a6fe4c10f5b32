//! Timed device jobs.
//!
//! A job pairs a [`Trigger`] with an [`Action`]:
//!
//! ```text
//! every 300          toggle light_livingroom
//! daily at 07:30     set socket_kitchen on
//! every 60s          read sensor_temp_main
//! ```
//!
//! Jobs go through the coordinator like any other front end. Transient
//! failures are retried with the shared [`RetryPolicy`]; a job that still
//! fails is logged and fires again at its next trigger.

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use homehub_coordinator::{
    CoordinatorError, DeviceCoordinator, RetryPolicy, ShutdownSignal, WriteOutcome,
};
use homehub_core::{DeviceId, DeviceState, StateValue, SwitchState};
use homehub_hal::DeviceHal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors parsing a job definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleParseError {
    #[error("invalid trigger {0:?}: expected 'every <secs>' or 'daily at HH:MM'")]
    InvalidTrigger(String),

    #[error("invalid action {0:?}: expected 'set <id> <state>', 'read <id>' or 'toggle <id>'")]
    InvalidAction(String),
}

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every interval, starting one interval after startup.
    Every(Duration),
    /// Once a day at a local wall-clock time.
    DailyAt(NaiveTime),
}

impl Trigger {
    /// Time left until the next firing, seen from local time `now`.
    #[must_use]
    pub fn next_delay(&self, now: NaiveDateTime) -> Duration {
        match self {
            Self::Every(interval) => *interval,
            Self::DailyAt(at) => {
                let today = now.date().and_time(*at);
                let next = if today > now {
                    today
                } else {
                    today + TimeDelta::days(1)
                };
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

impl FromStr for Trigger {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleParseError::InvalidTrigger(s.to_string());
        let words: Vec<&str> = s.split_whitespace().collect();

        match words.as_slice() {
            ["every", secs] => {
                let secs: u64 = secs
                    .strip_suffix('s')
                    .unwrap_or(secs)
                    .parse()
                    .map_err(|_| invalid())?;
                if secs == 0 {
                    return Err(invalid());
                }
                Ok(Self::Every(Duration::from_secs(secs)))
            }
            ["daily", "at", time] => NaiveTime::parse_from_str(time, "%H:%M")
                .map(Self::DailyAt)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(interval) => write!(f, "every {}s", interval.as_secs()),
            Self::DailyAt(at) => write!(f, "daily at {}", at.format("%H:%M")),
        }
    }
}

/// What a job does when it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Set { device: DeviceId, value: StateValue },
    Read { device: DeviceId },
    /// Read the switch state and write the opposite.
    Toggle { device: DeviceId },
}

impl Action {
    /// Device the action targets.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        match self {
            Self::Set { device, .. } | Self::Read { device } | Self::Toggle { device } => device,
        }
    }
}

impl FromStr for Action {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleParseError::InvalidAction(s.to_string());
        let mut words = s.split_whitespace();
        let verb = words.next().ok_or_else(invalid)?;
        let device: DeviceId = words
            .next()
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;
        let rest: Vec<&str> = words.collect();

        match (verb, rest.as_slice()) {
            ("set", [_, ..]) => Ok(Self::Set {
                device,
                value: StateValue::Text(rest.join(" ")),
            }),
            ("read", []) => Ok(Self::Read { device }),
            ("toggle", []) => Ok(Self::Toggle { device }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { device, value } => write!(f, "set {device} {value}"),
            Self::Read { device } => write!(f, "read {device}"),
            Self::Toggle { device } => write!(f, "toggle {device}"),
        }
    }
}

/// A named trigger/action pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub trigger: Trigger,
    pub action: Action,
}

impl Job {
    /// Parse a job from its textual trigger and action.
    ///
    /// # Errors
    ///
    /// Returns a `ScheduleParseError` naming the part that did not parse.
    pub fn parse(
        name: impl Into<String>,
        trigger: &str,
        action: &str,
    ) -> Result<Self, ScheduleParseError> {
        Ok(Self {
            name: name.into(),
            trigger: trigger.parse()?,
            action: action.parse()?,
        })
    }
}

/// Result of one successful job run.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Read {
        device: DeviceId,
        state: DeviceState,
    },
    Written {
        device: DeviceId,
        value: StateValue,
        outcome: WriteOutcome,
    },
}

impl JobOutcome {
    /// Whether the device ended up in the requested state.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Read { .. } => true,
            Self::Written { outcome, .. } => outcome.succeeded(),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { device, state } => write!(f, "{device} = {}", state.value),
            Self::Written {
                device,
                value,
                outcome,
            } => match outcome {
                WriteOutcome::Applied => write!(f, "{device} set to {value}"),
                WriteOutcome::Declined => write!(f, "{device} declined {value}"),
                WriteOutcome::Unsupported { kind } => {
                    write!(f, "{device} ({kind}) does not accept writes")
                }
            },
        }
    }
}

/// Run one action against the coordinator.
///
/// # Errors
///
/// Returns the coordinator error; a toggle of a device whose current value
/// is not a switch state fails with `InvalidValue`.
pub async fn perform<H: DeviceHal>(
    coordinator: &DeviceCoordinator<H>,
    action: &Action,
) -> Result<JobOutcome, CoordinatorError> {
    match action {
        Action::Read { device } => {
            let state = coordinator.get_state(device.as_str()).await?;
            Ok(JobOutcome::Read {
                device: device.clone(),
                state,
            })
        }
        Action::Set { device, value } => {
            let outcome = coordinator.set_state(device.as_str(), value.clone()).await?;
            Ok(JobOutcome::Written {
                device: device.clone(),
                value: value.clone(),
                outcome,
            })
        }
        Action::Toggle { device } => {
            let current = coordinator.get_state(device.as_str()).await?;
            let next = SwitchState::from_value(&current.value)
                .map_err(|_| CoordinatorError::InvalidValue {
                    device: device.to_string(),
                    value: current.value.to_string(),
                })?
                .toggled();
            let outcome = coordinator.set_state(device.as_str(), next.into()).await?;
            Ok(JobOutcome::Written {
                device: device.clone(),
                value: next.into(),
                outcome,
            })
        }
    }
}

/// Runs every configured job until shutdown.
pub struct Scheduler<H> {
    coordinator: Arc<DeviceCoordinator<H>>,
    jobs: Vec<Job>,
    policy: RetryPolicy,
}

impl<H: DeviceHal> Scheduler<H> {
    pub fn new(coordinator: Arc<DeviceCoordinator<H>>, jobs: Vec<Job>, policy: RetryPolicy) -> Self {
        Self {
            coordinator,
            jobs,
            policy,
        }
    }

    /// Number of configured jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Drive all jobs concurrently until shutdown.
    ///
    /// Job failures never end the scheduler.
    pub async fn run(self, shutdown: ShutdownSignal) -> crate::Result<()> {
        info!(jobs = self.jobs.len(), "Scheduler started");
        futures::future::join_all(self.jobs.iter().map(|job| self.run_job(job, &shutdown))).await;
        info!("Scheduler stopped");
        Ok(())
    }

    async fn run_job(&self, job: &Job, shutdown: &ShutdownSignal) {
        loop {
            let delay = job.trigger.next_delay(Local::now().naive_local());
            debug!(
                job = %job.name,
                trigger = %job.trigger,
                delay_ms = homehub_core::duration_ms(delay),
                "Job scheduled"
            );
            if !shutdown.sleep(delay).await {
                return;
            }

            let result = self
                .policy
                .retry(shutdown, || perform(&self.coordinator, &job.action))
                .await;
            match result {
                Ok(outcome) if outcome.succeeded() => {
                    info!(job = %job.name, outcome = %outcome, "Job completed");
                }
                Ok(outcome) => warn!(job = %job.name, outcome = %outcome, "Job not applied"),
                Err(CoordinatorError::ShuttingDown) => return,
                Err(e) => warn!(
                    job = %job.name,
                    action = %job.action,
                    kind = %e.kind(),
                    error = %e,
                    "Job failed"
                ),
            }
        }
    }
}
