//! Device access coordination for the home hub.
//!
//! Every front end (command server, console, poller, scheduler) reaches the
//! devices through one [`DeviceCoordinator`]. The coordinator owns the device
//! [`Registry`], admits HAL calls through a bounded [`AccessGate`] and turns
//! HAL failures into a stable [`ErrorKind`] taxonomy.
//!
//! The long-running activities that use it are started and stopped by the
//! [`LifecycleManager`], which shares one [`ShutdownSignal`] with all of them.
//! Periodic callers apply a common [`RetryPolicy`].

pub mod coordinator;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod policy;
pub mod registry;
pub mod signal;

pub use coordinator::{CoordinatorConfig, DeviceCoordinator, WriteOutcome};
pub use error::{CoordinatorError, ErrorKind, Result};
pub use gate::{AccessGate, GatePermit};
pub use lifecycle::{
    ActivityOutcome, ActivityReport, EXIT_CLEAN, EXIT_FATAL_INIT, EXIT_FORCED, LifecycleManager,
    Phase, ShutdownReport,
};
pub use policy::RetryPolicy;
pub use registry::Registry;
pub use signal::{ShutdownReason, ShutdownSignal};
