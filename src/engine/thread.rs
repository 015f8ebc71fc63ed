//! Dedicated hook thread
//!
//! The engine is single-threaded: one thread owns it and runs the hook
//! pass for each event fed to it, in order. Callers on the tokio runtime
//! send an event and await the decision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::hook::{HookDecision, TriggerEngine};
use crate::context::KeyEvent;

enum HookRequest {
    Event {
        event: KeyEvent,
        reply: oneshot::Sender<HookDecision>,
    },
    Stop,
}

/// Owns the thread running a [`TriggerEngine`]
pub struct HookThread {
    requests: mpsc::Sender<HookRequest>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HookThread {
    /// Moves the engine onto a new thread
    pub fn spawn(engine: TriggerEngine) -> Result<Self, HookError> {
        let (tx, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("trigger-hook".to_string())
            .spawn(move || {
                info!("hook thread started");
                run_hook_loop(engine, rx);
                flag.store(false, Ordering::SeqCst);
                info!("hook thread stopped");
            })
            .map_err(|e| HookError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            requests: tx,
            running,
            handle: Some(handle),
        })
    }

    /// Runs the hook pass for one event
    pub async fn hook(&self, event: KeyEvent) -> Result<HookDecision, HookError> {
        if !self.is_running() {
            return Err(HookError::NotRunning);
        }
        let (reply, decision) = oneshot::channel();
        self.requests
            .send(HookRequest::Event { event, reply })
            .map_err(|_| HookError::NotRunning)?;
        decision.await.map_err(|_| HookError::NotRunning)
    }

    /// Stops the thread after the events already queued
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.requests.send(HookRequest::Stop);
        if handle.join().is_err() {
            warn!("hook thread panicked");
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for HookThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Errors of the hook thread
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),

    #[error("hook thread is not running")]
    NotRunning,
}

fn run_hook_loop(mut engine: TriggerEngine, requests: mpsc::Receiver<HookRequest>) {
    while let Ok(request) = requests.recv() {
        match request {
            HookRequest::Event { event, reply } => {
                let decision = engine.hook(&event);
                // the caller may have given up waiting
                if reply.send(decision).is_err() {
                    debug!(vk = %event.vk, "hook decision dropped");
                }
            }
            HookRequest::Stop => break,
        }
    }
}
