//! # homehubd
//!
//! Composition root of the home hub: loads configuration, builds the HAL and
//! the device coordinator, then runs the command server, console, poller,
//! scheduler and signal listener until shutdown.
//!
//! Exit codes: `0` clean shutdown, `1` forced or failed shutdown, `2` fatal
//! initialization error.

use anyhow::Context;
use clap::{Parser, Subcommand};
use homehub_cli::config::Config;
use homehub_cli::console::Console;
use homehub_cli::poller::{self, Poller};
use homehub_cli::scheduler::Scheduler;
use homehub_cli::signals;
use homehub_coordinator::{DeviceCoordinator, EXIT_FATAL_INIT, LifecycleManager, ShutdownSignal};
use homehub_core::StateValue;
use homehub_network::{CommandClient, CommandClientConfig, CommandServer, Request};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Time given to blocked worker threads (such as a pending stdin read) after
/// the activities have stopped.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "homehubd", version, about = "Home automation hub daemon")]
struct Cli {
    /// Path to the configuration file (default: ./homehub.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not start the interactive console
    #[arg(long)]
    no_console: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Send one command to a running hub and print the JSON reply
    Request {
        /// Command server address
        #[arg(long, default_value = "127.0.0.1:9998")]
        addr: SocketAddr,

        /// Command name (set, get, status_all, list_devices, ping)
        command: String,

        /// Target device
        device_id: Option<String>,

        /// State to write; JSON literals such as `true` or `21.5` are sent
        /// as such, anything else as text
        state: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("homehubd: {e}");
            std::process::exit(EXIT_FATAL_INIT);
        }
    };
    init_tracing(&config.logging.filter);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("homehub-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            std::process::exit(EXIT_FATAL_INIT);
        }
    };

    let code = match cli.command {
        Some(CliCommand::Request {
            addr,
            command,
            device_id,
            state,
        }) => runtime.block_on(send_request(addr, command, device_id, state)),
        None => match runtime.block_on(serve(config, cli.no_console)) {
            Ok(code) => code,
            Err(e) => {
                error!("Fatal initialization error: {e:#}");
                EXIT_FATAL_INIT
            }
        },
    };

    // A console blocked on stdin keeps a worker thread busy; do not wait for it.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    std::process::exit(code);
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("homehubd: invalid log filter {filter:?} ({e}), using \"info\"");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build everything, run until shutdown, and return the exit code.
async fn serve(config: Config, no_console: bool) -> anyhow::Result<i32> {
    info!(version = homehub_core::VERSION, "Starting homehubd");
    let shutdown = ShutdownSignal::new();

    let hal = config.build_hal().await.context("failed to initialize HAL")?;
    let coordinator = Arc::new(
        DeviceCoordinator::new(hal, config.coordinator_config(), shutdown.clone())
            .await
            .context("failed to construct device coordinator")?,
    );
    if coordinator.registry().is_empty() {
        warn!("No devices registered; every device command will fail");
    }

    let server = CommandServer::bind(config.server_config(), Arc::clone(&coordinator))
        .await
        .context("failed to start command server")?;
    let jobs = config.schedule_jobs().context("invalid schedule")?;
    let policy = config.retry_policy();
    let stop_timeout = config.stop_timeout();

    let mut lifecycle = LifecycleManager::new(shutdown);

    lifecycle.spawn("signals", stop_timeout, signals::listen);
    lifecycle.spawn("command_server", stop_timeout, move |shutdown| {
        server.run(shutdown)
    });

    if config.poller.enabled {
        let devices = config.poller_devices().context("invalid poller devices")?;
        for device in &devices {
            if !coordinator.registry().contains(device.as_str()) {
                warn!(device_id = %device, "Polled device is not registered");
            }
        }
        let (tx, rx) = mpsc::channel(config.poller.queue_capacity);
        let poller = Poller::new(Arc::clone(&coordinator), devices, policy, tx);
        lifecycle.spawn("poller", stop_timeout, move |shutdown| poller.run(shutdown));
        lifecycle.spawn("poll_log", stop_timeout, move |shutdown| {
            poller::run_log_consumer(rx, shutdown)
        });
    }

    if !jobs.is_empty() {
        let scheduler = Scheduler::new(Arc::clone(&coordinator), jobs, policy);
        lifecycle.spawn("scheduler", stop_timeout, move |shutdown| {
            scheduler.run(shutdown)
        });
    }

    if config.console.enabled && !no_console {
        let console = Console::new(
            Arc::clone(&coordinator),
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        );
        lifecycle.spawn("console", stop_timeout, move |shutdown| async move {
            let mut console = console;
            console.run(shutdown).await
        });
    }

    let report = lifecycle.run().await;
    if let Some(reason) = &report.reason {
        info!(reason = %reason, "Shutdown reason");
    }
    for activity in &report.activities {
        info!(
            activity = %activity.name,
            outcome = %activity.outcome,
            stop_time_ms = homehub_core::duration_ms(activity.stop_time),
            "Activity report"
        );
    }
    Ok(report.exit_code())
}

/// `homehubd request`: one round trip to a running hub.
async fn send_request(
    addr: SocketAddr,
    command: String,
    device_id: Option<String>,
    state: Option<String>,
) -> i32 {
    let request = Request {
        command,
        device_id,
        state: state.map(|s| serde_json::from_str(&s).unwrap_or(StateValue::Text(s))),
    };

    let mut client = CommandClient::new(CommandClientConfig {
        server_addr: addr,
        ..CommandClientConfig::default()
    });
    let result = async {
        client.connect().await?;
        let response = client.request(&request).await?;
        client.close().await?;
        Ok::<_, homehub_network::CommandClientError>(response)
    }
    .await;

    match result {
        Ok(response) => {
            match serde_json::to_string_pretty(&response) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("homehubd: failed to format reply: {e}"),
            }
            if response.success { 0 } else { 1 }
        }
        Err(e) => {
            eprintln!("homehubd: request to {addr} failed: {e}");
            1
        }
    }
}
