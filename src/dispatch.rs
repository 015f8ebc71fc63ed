//! Handoff of matched triggers from the hook thread to the action runner
//!
//! The hook thread must never block, so [`Dispatch::dispatch`] only
//! enqueues. [`ActionRunner`] drains the queue on the tokio runtime, runs
//! the actions on the blocking pool and broadcasts what happened.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::args::TriggerArgs;
use crate::context::MuteMods;
use crate::events::TriggerEvent;
use crate::registry::{TriggerDef, TriggerKind};

/// A recognized trigger ready to run
#[derive(Debug, Clone)]
pub struct Fired {
    pub trigger: Arc<TriggerDef>,
    pub args: TriggerArgs,
    /// Modifier release instruction for whoever sends keys
    pub mute: MuteMods,
}

/// Receives fired triggers on the hook thread. Must not block.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, fired: Fired);
}

impl<F> Dispatch for F
where
    F: Fn(Fired) + Send + Sync,
{
    fn dispatch(&self, fired: Fired) {
        self(fired)
    }
}

/// Dispatch into a bounded channel; drops the trigger when the runner is
/// behind
pub struct ChannelDispatch {
    tx: mpsc::Sender<Fired>,
}

impl ChannelDispatch {
    pub fn new(tx: mpsc::Sender<Fired>) -> Self {
        Self { tx }
    }
}

impl Dispatch for ChannelDispatch {
    fn dispatch(&self, fired: Fired) {
        match self.tx.try_send(fired) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(f)) => {
                warn!(trigger = %f.trigger, "action queue full, trigger dropped");
            }
            Err(mpsc::error::TrySendError::Closed(f)) => {
                debug!(trigger = %f.trigger, "action runner gone, trigger dropped");
            }
        }
    }
}

/// Runs trigger actions and reports them to subscribers
pub struct ActionRunner {
    event_tx: broadcast::Sender<TriggerEvent>,
}

impl ActionRunner {
    pub fn new(event_tx: broadcast::Sender<TriggerEvent>) -> Self {
        Self { event_tx }
    }

    /// Run until every sender of `fired_rx` is dropped
    pub async fn run(&self, mut fired_rx: mpsc::Receiver<Fired>) {
        info!("action runner started");

        while let Some(fired) = fired_rx.recv().await {
            self.handle(fired);
        }

        info!("action runner stopped");
    }

    fn handle(&self, fired: Fired) {
        let Fired {
            trigger,
            args,
            mute,
        } = fired;

        let replace = match (&trigger.kind, args.as_autotext()) {
            (TriggerKind::Autotext(x), Some(a)) => x.replacement().map(|r| a.replace_plan(r)),
            _ => None,
        };
        let event = TriggerEvent::TriggerFired {
            id: trigger.id,
            trigger: trigger.to_string(),
            args: args.clone(),
            mute,
            replace,
        };
        info!(id = %trigger.id, trigger = %trigger, source = %trigger.source, "trigger fired");
        let _ = self.event_tx.send(event);

        let Some(action) = trigger.action().cloned() else {
            return;
        };
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || action(&args)).await;
            let error = match result {
                Ok(Ok(())) => return,
                Ok(Err(e)) => format!("{e:#}"),
                Err(e) => format!("action panicked: {e}"),
            };
            warn!(trigger = %trigger, %error, "trigger action failed");
            let _ = event_tx.send(TriggerEvent::ActionFailed {
                id: trigger.id,
                trigger: trigger.to_string(),
                error,
            });
        });
    }
}
