//! Integration tests for LifecycleManager
//!
//! These tests verify that every shutdown trigger converges on the shared
//! signal and that stop timeouts are applied per activity.

use homehub_coordinator::{
    ActivityOutcome, CoordinatorConfig, DeviceCoordinator, LifecycleManager, Phase,
    ShutdownReason, ShutdownSignal,
};
use homehub_hal::MockHal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};

#[tokio::test]
async fn test_external_trigger_stops_all_activities() {
    let signal = ShutdownSignal::new();
    let mut lifecycle = LifecycleManager::new(signal.clone());
    let mut phases = lifecycle.subscribe();

    for name in ["poller", "server", "console"] {
        lifecycle.spawn(name, Duration::from_secs(1), |shutdown| async move {
            shutdown.cancelled().await;
            Ok::<(), String>(())
        });
    }

    let run = tokio::spawn(lifecycle.run());
    phases.wait_for(|p| *p == Phase::Running).await.unwrap();

    signal.trigger(ShutdownReason::OsSignal("SIGTERM"));
    let report = timeout(Duration::from_secs(2), run).await.unwrap().unwrap();

    assert_eq!(report.reason, Some(ShutdownReason::OsSignal("SIGTERM")));
    assert_eq!(report.activities.len(), 3);
    assert!(report.is_clean());
    assert_eq!(*phases.borrow(), Phase::Stopped);
}

#[tokio::test]
async fn test_stuck_activity_does_not_block_others() {
    let signal = ShutdownSignal::new();
    let mut lifecycle = LifecycleManager::new(signal.clone());

    lifecycle.spawn("stuck", Duration::from_millis(100), |_| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<(), String>(())
    });
    lifecycle.spawn("polite", Duration::from_secs(1), |shutdown| async move {
        shutdown.cancelled().await;
        Ok::<(), String>(())
    });

    signal.trigger(ShutdownReason::ConsoleExit);
    let started = Instant::now();
    let report = lifecycle.run().await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.activities[0].outcome, ActivityOutcome::TimedOut);
    assert_eq!(report.activities[1].outcome, ActivityOutcome::Clean);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_racing_triggers_keep_first_reason() {
    let signal = ShutdownSignal::new();
    let mut lifecycle = LifecycleManager::new(signal.clone());

    for i in 0..4 {
        lifecycle.spawn(format!("racer{i}"), Duration::from_secs(1), move |shutdown| async move {
            shutdown.trigger(ShutdownReason::ActivityExited(format!("racer{i}")));
            shutdown.cancelled().await;
            Ok::<(), String>(())
        });
    }

    let report = lifecycle.run().await;
    assert!(matches!(
        report.reason,
        Some(ShutdownReason::ActivityExited(_))
    ));
    assert!(report
        .activities
        .iter()
        .all(|a| a.outcome == ActivityOutcome::Clean));
}

#[tokio::test]
async fn test_activities_share_coordinator_through_shutdown() {
    let signal = ShutdownSignal::new();
    let (hal, handle) = MockHal::new();
    let coordinator = Arc::new(
        DeviceCoordinator::new(hal, CoordinatorConfig::default(), signal.clone())
            .await
            .unwrap(),
    );
    let mut lifecycle = LifecycleManager::new(signal.clone());

    let poller = Arc::clone(&coordinator);
    lifecycle.spawn("poller", Duration::from_secs(1), move |shutdown| async move {
        while shutdown.sleep(Duration::from_millis(5)).await {
            let _ = poller.get_state("sensor_temp_main").await;
        }
        Ok::<(), String>(())
    });

    let run = tokio::spawn(lifecycle.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    signal.trigger(ShutdownReason::ConsoleExit);

    let report = run.await.unwrap();
    assert!(report.is_clean());
    assert!(handle.stats().reads > 0);
    assert!(coordinator.get_state("light_livingroom").await.is_err());
}
