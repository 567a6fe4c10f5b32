//! Periodic device polling.
//!
//! The poller reads a fixed set of devices on every round and pushes one
//! [`PollEvent`] per device into a bounded channel. A separate log consumer
//! drains the channel and writes the readings out, so a slow sink slows the
//! poller down instead of growing memory.

use crate::error::{ActivityError, Result};
use homehub_coordinator::{CoordinatorError, DeviceCoordinator, RetryPolicy, ShutdownSignal};
use homehub_core::{DeviceId, DeviceState};
use homehub_hal::DeviceHal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Pause before a blocking send once the queue is full.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

/// One poll result.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Reading {
        device: DeviceId,
        state: DeviceState,
    },
    Failed {
        device: DeviceId,
        error: CoordinatorError,
    },
}

impl PollEvent {
    pub fn device(&self) -> &DeviceId {
        match self {
            Self::Reading { device, .. } | Self::Failed { device, .. } => device,
        }
    }
}

/// Reads the configured devices at the pace set by a [`RetryPolicy`].
pub struct Poller<H> {
    coordinator: Arc<DeviceCoordinator<H>>,
    devices: Vec<DeviceId>,
    policy: RetryPolicy,
    events: mpsc::Sender<PollEvent>,
}

impl<H: DeviceHal> Poller<H> {
    pub fn new(
        coordinator: Arc<DeviceCoordinator<H>>,
        devices: Vec<DeviceId>,
        policy: RetryPolicy,
        events: mpsc::Sender<PollEvent>,
    ) -> Self {
        Self {
            coordinator,
            devices,
            policy,
            events,
        }
    }

    /// Poll until shutdown.
    ///
    /// A round where any device fails is followed by the policy's failure
    /// backoff instead of the normal interval.
    ///
    /// # Errors
    ///
    /// Returns `ActivityError::ChannelClosed` if the consumer went away
    /// before shutdown.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<()> {
        info!(
            devices = self.devices.len(),
            interval_ms = homehub_core::duration_ms(self.policy.interval),
            "Poller started"
        );

        while !shutdown.is_triggered() {
            let mut round_ok = true;

            for device in &self.devices {
                let event = match self.coordinator.get_state(device.as_str()).await {
                    Ok(state) => PollEvent::Reading {
                        device: device.clone(),
                        state,
                    },
                    Err(CoordinatorError::ShuttingDown) => return Ok(()),
                    Err(error) => {
                        round_ok = false;
                        PollEvent::Failed {
                            device: device.clone(),
                            error,
                        }
                    }
                };

                if !self.publish(event, &shutdown).await? {
                    return Ok(());
                }
            }

            let delay = self.policy.next_delay(round_ok);
            debug!(round_ok, delay_ms = homehub_core::duration_ms(delay), "Poll round complete");
            if !shutdown.sleep(delay).await {
                break;
            }
        }

        info!("Poller stopped");
        Ok(())
    }

    /// Queue one event. Returns `false` if shutdown interrupted the wait.
    async fn publish(&self, event: PollEvent, shutdown: &ShutdownSignal) -> Result<bool> {
        match self.events.try_send(event) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(event)) => {
                warn!(device_id = %event.device(), "Poll queue full, backing off");
                if !shutdown.sleep(QUEUE_FULL_BACKOFF).await {
                    return Ok(false);
                }
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => Ok(false),
                    sent = self.events.send(event) => match sent {
                        Ok(()) => Ok(true),
                        Err(_) => self.closed(shutdown),
                    },
                }
            }
            Err(TrySendError::Closed(_)) => self.closed(shutdown),
        }
    }

    fn closed(&self, shutdown: &ShutdownSignal) -> Result<bool> {
        if shutdown.is_triggered() {
            Ok(false)
        } else {
            Err(ActivityError::ChannelClosed("poll queue"))
        }
    }
}

/// Write queued poll events to the log until shutdown, then drain the queue.
pub async fn run_log_consumer(
    mut events: mpsc::Receiver<PollEvent>,
    shutdown: ShutdownSignal,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
        }
    }

    events.close();
    let mut drained = 0usize;
    while let Ok(event) = events.try_recv() {
        log_event(&event);
        drained += 1;
    }
    debug!(drained, "Poll log consumer stopped");
    Ok(())
}

fn log_event(event: &PollEvent) {
    match event {
        PollEvent::Reading { device, state } => info!(
            device_id = %device,
            value = %state.value,
            observed_at = %state.observed_at.to_rfc3339(),
            "Device reading"
        ),
        PollEvent::Failed { device, error } => warn!(
            device_id = %device,
            kind = %error.kind(),
            error = %error,
            "Device poll failed"
        ),
    }
}
