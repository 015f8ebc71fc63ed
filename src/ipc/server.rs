//! Unix domain socket server for IPC
//!
//! Provides request-response communication, the key event path for the
//! hook shim and push notifications of trigger events to subscribed
//! clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use trigger_daemon::autotext::TableTranslator;
use trigger_daemon::dispatch::Dispatch;
use trigger_daemon::engine::{ActionTriggers, AutotextOptions, HookThread, ResetFlag};
use trigger_daemon::events::TriggerEvent;
use trigger_daemon::registry::Action;

use super::protocol::{
    autotext_flags, hotkey_flags, DaemonStatus, Notification, Request, Response, MAX_MESSAGE_LEN,
};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared server state
struct ServerState {
    triggers: Mutex<ActionTriggers>,
    /// Present while the engine runs
    hook: RwLock<Option<HookThread>>,
    dispatch: Arc<dyn Dispatch>,
    reset: ResetFlag,
    event_tx: broadcast::Sender<TriggerEvent>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        triggers: ActionTriggers,
        dispatch: Arc<dyn Dispatch>,
        event_tx: broadcast::Sender<TriggerEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(ServerState {
            reset: triggers.reset_flag(),
            triggers: Mutex::new(triggers),
            hook: RwLock::new(None),
            dispatch,
            event_tx,
            start_time: Instant::now(),
        });

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, state: Arc<ServerState>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // responses and notifications share one writer
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(64);
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = writer.write_all(&frame).await {
                    debug!(?e, "client write failed");
                    break;
                }
            }
        });

        let mut forwarder = None;
        let result = loop {
            let msg = match read_message(&mut reader).await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    debug!("client disconnected");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };

            let response = match serde_json::from_slice::<Request>(&msg) {
                Ok(request) => {
                    debug!(?request, "received request");
                    let (response, subscribe) = Self::process_request(request, &state).await;
                    if subscribe && forwarder.is_none() {
                        debug!("client subscribed to notifications");
                        forwarder = Some(tokio::spawn(forward_events(
                            state.event_tx.subscribe(),
                            out_tx.clone(),
                        )));
                    }
                    response
                }
                Err(e) => Response::error("bad_request", e.to_string()),
            };

            if out_tx.send(encode_message(&response)?).await.is_err() {
                break Ok(());
            }
        };

        if let Some(task) = forwarder {
            task.abort();
        }
        drop(out_tx);
        let _ = writer_task.await;
        result
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, state: &ServerState) -> (Response, bool) {
        let response = match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let triggers = state.triggers.lock().await;
                Response::Status(DaemonStatus {
                    engine: triggers.state(),
                    hotkeys: triggers.hotkey_count(),
                    autotexts: triggers.autotext_count(),
                    disabled: triggers.is_disabled_all(),
                    uptime_secs: state.start_time.elapsed().as_secs(),
                    ..DaemonStatus::default()
                })
            }

            Request::Subscribe => return (Response::Subscribed, true),

            Request::RegisterHotkey {
                hotkey,
                flags,
                block_only,
            } => {
                let flags = match hotkey_flags(&flags) {
                    Ok(flags) => flags,
                    Err(name) => return (Response::error("invalid_flags", format!("unknown flag {name:?}")), false),
                };
                let action = (!block_only).then(notify_only);
                let mut triggers = state.triggers.lock().await;
                match triggers.add_hotkey(&hotkey, flags, action) {
                    Ok(id) => Response::Registered { id },
                    Err(e) => e.into(),
                }
            }

            Request::RegisterAutotext {
                text,
                replacement,
                flags,
                postfix_type,
                postfix_chars,
            } => {
                let flags = match flags.as_deref().map(autotext_flags).transpose() {
                    Ok(flags) => flags,
                    Err(name) => return (Response::error("invalid_flags", format!("unknown flag {name:?}")), false),
                };
                let options = AutotextOptions {
                    flags,
                    postfix_type,
                    postfix_chars,
                };
                let mut triggers = state.triggers.lock().await;
                let result = match replacement {
                    Some(r) => triggers.simple_replace(&text, &r, &options),
                    None => triggers.add_autotext(&text, &options, notify_only()),
                };
                match result {
                    Ok(id) => Response::Registered { id },
                    Err(e) => e.into(),
                }
            }

            Request::Unregister { id } => match state.triggers.lock().await.remove(id) {
                Ok(()) => Response::Ok,
                Err(e) => e.into(),
            },

            Request::ListTriggers => Response::Triggers {
                triggers: state.triggers.lock().await.list(),
            },

            Request::SetDisabled { id, disabled } => {
                let triggers = state.triggers.lock().await;
                match id {
                    Some(id) => match triggers.set_disabled(id, disabled) {
                        Ok(()) => Response::Ok,
                        Err(e) => e.into(),
                    },
                    None => {
                        triggers.set_disabled_all(disabled);
                        Response::Ok
                    }
                }
            }

            Request::Start => Self::start_engine(state).await,

            Request::Stop => Self::stop_engine(state).await,

            Request::KeyEvent { event } => match state.hook.read().await.as_ref() {
                Some(hook) => match hook.hook(event).await {
                    Ok(decision) => Response::Decision(decision),
                    Err(e) => Response::error("hook", e.to_string()),
                },
                None => Response::error("not_running", "the engine is not running"),
            },

            Request::ResetAutotext => {
                state.reset.request();
                Response::Ok
            }
        };
        (response, false)
    }

    async fn start_engine(state: &ServerState) -> Response {
        let mut triggers = state.triggers.lock().await;
        let mut hook = state.hook.write().await;

        let engine = match triggers.start(Box::new(TableTranslator), Arc::clone(&state.dispatch)) {
            Ok(engine) => engine,
            Err(e) => return e.into(),
        };
        match HookThread::spawn(engine) {
            Ok(thread) => {
                *hook = Some(thread);
                Response::Ok
            }
            Err(e) => {
                error!(?e, "failed to start hook thread");
                let _ = triggers.stop();
                Response::error("hook", e.to_string())
            }
        }
    }

    async fn stop_engine(state: &ServerState) -> Response {
        let mut triggers = state.triggers.lock().await;
        if let Err(e) = triggers.stop() {
            return e.into();
        }
        if let Some(mut thread) = state.hook.write().await.take() {
            // joining waits for queued events
            let _ = tokio::task::spawn_blocking(move || thread.stop()).await;
        }
        Response::Ok
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.state.triggers.lock().await.is_running() {
            Self::stop_engine(&self.state).await;
        }

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Action of IPC-registered triggers: clients learn about them through
/// notifications
fn notify_only() -> Action {
    Arc::new(|_| Ok(()))
}

async fn forward_events(mut event_rx: broadcast::Receiver<TriggerEvent>, out_tx: mpsc::Sender<Vec<u8>>) {
    loop {
        let event = match event_rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "subscriber lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let frame = match encode_message(&Notification::Event { event }) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(?e, "failed to encode notification");
                continue;
            }
        };
        if out_tx.send(frame).await.is_err() {
            break;
        }
    }
}

/// Read one length-prefixed message; `None` on a clean disconnect
async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];

    // Read message length (4-byte little-endian)
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        anyhow::bail!("message too large: {len} bytes");
    }

    // Read message body
    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Encode a length-prefixed JSON message
fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let msg_bytes = serde_json::to_vec(msg)?;
    let mut frame = Vec::with_capacity(4 + msg_bytes.len());
    frame.extend_from_slice(&(msg_bytes.len() as u32).to_le_bytes());
    frame.extend_from_slice(&msg_bytes);
    Ok(frame)
}
