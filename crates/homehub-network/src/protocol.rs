//! Wire types of the JSON-lines command protocol.
//!
//! One request per line, one response per line:
//!
//! ```text
//! → {"command": "set", "device_id": "light_livingroom", "state": "on"}
//! ← {"success": true, "message": "Device light_livingroom set to on"}
//! → {"command": "get", "device_id": "sensor_temp_main"}
//! ← {"success": true, "data": {"value": 22.4, "observed_at": "2025-..."}}
//! → {"command": "get", "device_id": "light_attic"}
//! ← {"success": false, "error": "Unknown device: light_attic", "kind": "unknown_device"}
//! ```

use homehub_coordinator::{CoordinatorError, ErrorKind};
use homehub_core::StateValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A request line as sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateValue>,
}

impl Request {
    /// Request without arguments (`ping`, `status_all`, `list_devices`).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            device_id: None,
            state: None,
        }
    }

    pub fn get(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            ..Self::new("get")
        }
    }

    pub fn set(device_id: impl Into<String>, state: impl Into<StateValue>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            state: Some(state.into()),
            ..Self::new("set")
        }
    }
}

/// Validated command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { device_id: String, state: StateValue },
    Get { device_id: String },
    StatusAll,
    ListDevices,
    Ping,
}

/// Request that does not form a valid command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("command '{command}' requires {fields}")]
    MissingArguments {
        command: &'static str,
        fields: &'static str,
    },
}

impl TryFrom<Request> for Command {
    type Error = ProtocolError;

    fn try_from(request: Request) -> Result<Self, Self::Error> {
        match request.command.as_str() {
            "set" => match (request.device_id, request.state) {
                (Some(device_id), Some(state)) if !device_id.is_empty() => {
                    Ok(Self::Set { device_id, state })
                }
                _ => Err(ProtocolError::MissingArguments {
                    command: "set",
                    fields: "'device_id' and 'state'",
                }),
            },
            "get" => match request.device_id {
                Some(device_id) if !device_id.is_empty() => Ok(Self::Get { device_id }),
                _ => Err(ProtocolError::MissingArguments {
                    command: "get",
                    fields: "'device_id'",
                }),
            },
            "status_all" => Ok(Self::StatusAll),
            "list_devices" => Ok(Self::ListDevices),
            "ping" => Ok(Self::Ping),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl Response {
    /// Successful response carrying data.
    pub fn data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            kind: None,
        }
    }

    /// Response carrying only a message.
    pub fn message(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            data: None,
            message: Some(message.into()),
            error: None,
            kind: None,
        }
    }

    /// Failed response without a classification (framing, parsing).
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            kind: None,
        }
    }

    /// Failed response with a classification.
    pub fn failure(error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::error(error)
        }
    }
}

impl From<&CoordinatorError> for Response {
    fn from(err: &CoordinatorError) -> Self {
        Self::failure(err.to_string(), err.kind())
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Self::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(line: &str) -> Result<Command, ProtocolError> {
        let request: Request = serde_json::from_str(line).unwrap();
        Command::try_from(request)
    }

    #[rstest]
    #[case(r#"{"command":"ping"}"#, Command::Ping)]
    #[case(r#"{"command":"status_all"}"#, Command::StatusAll)]
    #[case(r#"{"command":"list_devices"}"#, Command::ListDevices)]
    #[case(
        r#"{"command":"get","device_id":"light1"}"#,
        Command::Get { device_id: "light1".into() }
    )]
    #[case(
        r#"{"command":"set","device_id":"light1","state":true}"#,
        Command::Set { device_id: "light1".into(), state: StateValue::Bool(true) }
    )]
    #[case(
        r#"{"command":"set","device_id":"light1","state":"on"}"#,
        Command::Set { device_id: "light1".into(), state: StateValue::from("on") }
    )]
    fn test_parse_commands(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(parse(line).unwrap(), expected);
    }

    #[rstest]
    #[case(r#"{"command":"set","device_id":"light1"}"#)]
    #[case(r#"{"command":"set","state":"on"}"#)]
    #[case(r#"{"command":"get"}"#)]
    #[case(r#"{"command":"get","device_id":""}"#)]
    fn test_missing_arguments(#[case] line: &str) {
        assert!(matches!(
            parse(line),
            Err(ProtocolError::MissingArguments { .. })
        ));
    }

    #[test]
    fn test_unknown_command() {
        let err = parse(r#"{"command":"reboot"}"#).unwrap_err();
        assert_eq!(err.to_string(), "unknown command: reboot");
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let line = serde_json::to_string(&Response::message(true, "pong")).unwrap();
        assert_eq!(line, r#"{"success":true,"message":"pong"}"#);
    }

    #[test]
    fn test_failure_response_carries_kind() {
        let err = CoordinatorError::UnknownDevice("light9".into());
        let line = serde_json::to_string(&Response::from(&err)).unwrap();
        assert_eq!(
            line,
            r#"{"success":false,"error":"Unknown device: light9","kind":"unknown_device"}"#
        );
    }

    #[test]
    fn test_request_builders() {
        let line = serde_json::to_string(&Request::set("light1", "off")).unwrap();
        assert_eq!(
            line,
            r#"{"command":"set","device_id":"light1","state":"off"}"#
        );
        assert_eq!(Request::get("x").command, "get");
    }
}
