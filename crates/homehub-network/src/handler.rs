//! Translation of request lines into coordinator calls.

use crate::protocol::{Command, Request, Response};
use homehub_coordinator::{DeviceCoordinator, ErrorKind, WriteOutcome};
use homehub_core::DeviceState;
use homehub_hal::DeviceHal;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

/// Entry of a `status_all` reply.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StatusEntry {
    State(DeviceState),
    Failed { error: String, kind: String },
}

/// Handle one raw request line and produce the reply.
///
/// Never fails: malformed input and coordinator errors become
/// `{"success": false, ...}` responses.
pub async fn handle_line<H: DeviceHal>(coordinator: &DeviceCoordinator<H>, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::error(format!("invalid JSON: {e}")),
    };
    match Command::try_from(request) {
        Ok(command) => execute(coordinator, command).await,
        Err(e) => e.into(),
    }
}

/// Run a validated command against the coordinator.
pub async fn execute<H: DeviceHal>(coordinator: &DeviceCoordinator<H>, command: Command) -> Response {
    debug!(command = ?command, "Executing command");
    match command {
        Command::Ping => Response::message(true, "pong"),

        Command::Get { device_id } => match coordinator.get_state(&device_id).await {
            Ok(state) => Response::data(to_value(&state)),
            Err(e) => Response::from(&e),
        },

        Command::Set { device_id, state } => {
            match coordinator.set_state(&device_id, state.clone()).await {
                Ok(WriteOutcome::Applied) => {
                    Response::message(true, format!("Device {device_id} set to {state}"))
                }
                Ok(WriteOutcome::Declined) => {
                    Response::message(false, format!("Device {device_id} declined {state}"))
                }
                Ok(WriteOutcome::Unsupported { kind }) => Response::failure(
                    format!("Device {device_id} ({kind}) does not accept writes"),
                    ErrorKind::UnsupportedOperation,
                ),
                Err(e) => Response::from(&e),
            }
        }

        Command::StatusAll => {
            let states: BTreeMap<String, StatusEntry> = coordinator
                .get_all_states()
                .await
                .into_iter()
                .map(|(id, outcome)| {
                    let entry = match outcome {
                        Ok(state) => StatusEntry::State(state),
                        Err(e) => StatusEntry::Failed {
                            error: e.to_string(),
                            kind: e.kind().to_string(),
                        },
                    };
                    (id.into(), entry)
                })
                .collect();
            Response::data(to_value(&states))
        }

        Command::ListDevices => Response::data(to_value(&coordinator.list_devices())),
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| json!({ "encoding_error": e.to_string() }))
}
