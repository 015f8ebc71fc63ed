//! trigger-daemon: hosts the trigger engine behind a Unix socket
//!
//! This daemon provides:
//! - Hotkey and autotext matching on a dedicated hook thread
//! - Registration and Stopped/Running lifecycle control over IPC
//! - Trigger notifications for subscribed clients
//!
//! Installing the OS keyboard hook is left to a platform shim that forwards
//! raw key events as `key_event` requests and applies the decisions.

mod ipc;
mod lifecycle;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use trigger_daemon::config::Config;
use trigger_daemon::dispatch::{ActionRunner, ChannelDispatch};
use trigger_daemon::engine::ActionTriggers;
use trigger_daemon::events::TriggerEvent;

use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "trigger-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, "configuration loaded");

    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;

    // Hook thread -> action runner
    let (fired_tx, fired_rx) = mpsc::channel(64);
    // Controller and action runner -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<TriggerEvent>(256);

    let mut triggers = ActionTriggers::new(event_tx.clone());
    triggers.set_postfix_key(config.postfix_key)?;
    triggers.set_word_chars(&config.word_chars)?;
    triggers.set_default_layout(config.default_layout)?;

    let runner = ActionRunner::new(event_tx.clone());
    let dispatch = Arc::new(ChannelDispatch::new(fired_tx));

    let server = Server::new(&config.socket_path, triggers, dispatch, event_tx.clone())?;

    let mut log_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run trigger actions
        _ = runner.run(fired_rx) => {
            info!("action runner exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log engine events
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => info!(%event, "trigger event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event log receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event logger exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;

    info!("trigger-daemon stopped");

    Ok(())
}
