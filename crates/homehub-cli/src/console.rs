//! Interactive operator console.
//!
//! Reads one command per line and prints a human-readable reply. The console
//! is generic over its input and output so it can run on stdin/stdout or on
//! in-memory buffers.
//!
//! Commands:
//!
//! ```text
//! help                 show the command list
//! list                 list known devices and their kinds
//! status <id> | all    show the state of one device or of all devices
//! open <id>            switch a light or socket on
//! close <id>           switch a light or socket off
//! set <id> <state>     write an arbitrary state
//! exit | quit          shut the hub down
//! ```
//!
//! End of input behaves like `exit`.

use crate::error::Result;
use chrono::Local;
use homehub_coordinator::{
    CoordinatorError, DeviceCoordinator, ShutdownReason, ShutdownSignal, WriteOutcome,
};
use homehub_core::{DeviceState, StateValue, SwitchState};
use homehub_hal::DeviceHal;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

const PROMPT: &str = "homehub> ";

const HELP: &str = "\
Available commands:
  help                 show this help
  list                 list known devices and their kinds
  status <id> | all    show the state of one device or of all devices
  open <id>            switch a light or socket on
  close <id>           switch a light or socket off
  set <id> <state>     write a state to a device
  exit | quit          shut the hub down
";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    List,
    Status(String),
    StatusAll,
    Open(String),
    Close(String),
    Set(String, StateValue),
    Exit,
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the usage message to print for unknown commands or wrong
    /// arguments.
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let parsed = match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("help", []) => Self::Help,
            ("list", []) => Self::List,
            ("status", ["all"]) => Self::StatusAll,
            ("status", [id]) => Self::Status((*id).to_string()),
            ("status", _) => return Err("Usage: status <device_id> | all".into()),
            ("open", [id]) => Self::Open((*id).to_string()),
            ("open", _) => return Err("Usage: open <device_id>".into()),
            ("close", [id]) => Self::Close((*id).to_string()),
            ("close", _) => return Err("Usage: close <device_id>".into()),
            ("set", [id, state @ ..]) if !state.is_empty() => {
                Self::Set((*id).to_string(), StateValue::Text(state.join(" ")))
            }
            ("set", _) => return Err("Usage: set <device_id> <state>".into()),
            ("exit" | "quit", []) => Self::Exit,
            (other, _) => {
                return Err(format!(
                    "Unknown command '{other}'. Type 'help' for available commands."
                ));
            }
        };
        Ok(Some(parsed))
    }
}

/// Line-based console over any async reader/writer pair.
pub struct Console<H, R, W> {
    coordinator: Arc<DeviceCoordinator<H>>,
    input: R,
    output: W,
}

impl<H, R, W> Console<H, R, W>
where
    H: DeviceHal,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(coordinator: Arc<DeviceCoordinator<H>>, input: R, output: W) -> Self {
        Self {
            coordinator,
            input,
            output,
        }
    }

    /// The output sink, for inspection after a run.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Serve commands until `exit`, end of input, or shutdown.
    ///
    /// `exit` and end of input trigger shutdown with
    /// [`ShutdownReason::ConsoleExit`].
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub async fn run(&mut self, shutdown: ShutdownSignal) -> Result<()> {
        info!("Console started");
        self.output
            .write_all(b"Home hub console. Type 'help' for commands, 'exit' to quit.\n")
            .await?;

        let mut line = String::new();
        loop {
            self.output.write_all(PROMPT.as_bytes()).await?;
            self.output.flush().await?;

            line.clear();
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                read = self.input.read_line(&mut line) => read?,
            };

            if read == 0 {
                debug!("Console input closed");
                shutdown.trigger(ShutdownReason::ConsoleExit);
                break;
            }

            match ConsoleCommand::parse(&line) {
                Ok(None) => {}
                Ok(Some(ConsoleCommand::Exit)) => {
                    self.output.write_all(b"Shutting down...\n").await?;
                    shutdown.trigger(ShutdownReason::ConsoleExit);
                    break;
                }
                Ok(Some(command)) => {
                    let reply = self.execute(command).await;
                    self.output.write_all(reply.as_bytes()).await?;
                }
                Err(usage) => {
                    self.output.write_all(usage.as_bytes()).await?;
                    self.output.write_all(b"\n").await?;
                }
            }
        }

        self.output.flush().await?;
        info!("Console stopped");
        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> String {
        debug!(command = ?command, "Console command");
        match command {
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::List => {
                let devices = self.coordinator.list_devices();
                if devices.is_empty() {
                    return "No devices registered.\n".to_string();
                }
                let mut out = String::from("Known devices:\n");
                for (id, kind) in devices {
                    out.push_str(&format!("  {id:<24} {kind}\n"));
                }
                out
            }
            ConsoleCommand::Status(id) => {
                status_line(&id, self.coordinator.get_state(&id).await)
            }
            ConsoleCommand::StatusAll => {
                let states = self.coordinator.get_all_states().await;
                if states.is_empty() {
                    return "No devices registered.\n".to_string();
                }
                states
                    .into_iter()
                    .map(|(id, state)| status_line(id.as_str(), state))
                    .collect()
            }
            ConsoleCommand::Open(id) => self.write(&id, SwitchState::On.into()).await,
            ConsoleCommand::Close(id) => self.write(&id, SwitchState::Off.into()).await,
            ConsoleCommand::Set(id, value) => self.write(&id, value).await,
            ConsoleCommand::Exit => String::new(),
        }
    }

    async fn write(&self, id: &str, value: StateValue) -> String {
        match self.coordinator.set_state(id, value.clone()).await {
            Ok(WriteOutcome::Applied) => format!("OK: {id} set to {value}\n"),
            Ok(WriteOutcome::Declined) => format!("FAILED: {id} declined {value}\n"),
            Ok(WriteOutcome::Unsupported { kind }) => {
                format!("FAILED: {id} ({kind}) does not accept writes\n")
            }
            Err(e) => error_line(&e),
        }
    }
}

fn status_line(id: &str, state: std::result::Result<DeviceState, CoordinatorError>) -> String {
    match state {
        Ok(state) => format!(
            "  {id:<24} {:<8} (observed {})\n",
            state.value.to_string(),
            state
                .observed_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        ),
        Err(e) => format!("  {id:<24} {}", error_line(&e)),
    }
}

fn error_line(err: &CoordinatorError) -> String {
    format!("ERROR [{}]: {err}\n", err.kind())
}
