//! The hook pass: one call per raw key event

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::autotext::AutotextMatcher;
use crate::context::{HookContext, KeyEvent};
use crate::dispatch::Dispatch;
use crate::hotkey::HotkeyMatcher;
use crate::keys::ModifierState;
use crate::registry::{Registry, TriggerId};

/// "Reset autotext everywhere" request, settable from any thread or
/// process-facing handler and taken by the hook thread
#[derive(Debug, Clone, Default)]
pub struct ResetFlag(Arc<AtomicBool>);

impl ResetFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears the flag, returning whether it was set
    pub fn take(&self) -> bool {
        // plain load first: the flag is almost always clear
        self.0.load(Ordering::Acquire) && self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Frozen definitions the running engine matches against
#[derive(Debug, Default)]
pub struct Snapshot {
    pub hotkeys: Registry,
    pub autotexts: Registry,
}

/// What the hook shim should do with the event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDecision {
    /// Swallow the event
    pub eat: bool,
    /// Tap `Ctrl` now so the held `Alt`/`Win` does not open a menu
    #[serde(default)]
    pub menu_guard: bool,
    /// The trigger handed to the action runner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fired: Option<TriggerId>,
}

impl HookDecision {
    pub fn pass() -> Self {
        Self::default()
    }
}

/// Owns all per-session matching state; lives on the hook thread
pub struct TriggerEngine {
    snapshot: Arc<Snapshot>,
    disabled: Arc<AtomicBool>,
    reset: ResetFlag,
    mods: ModifierState,
    hotkey: HotkeyMatcher,
    autotext: AutotextMatcher,
    dispatch: Arc<dyn Dispatch>,
}

impl TriggerEngine {
    pub fn new(
        snapshot: Arc<Snapshot>,
        disabled: Arc<AtomicBool>,
        reset: ResetFlag,
        autotext: AutotextMatcher,
        dispatch: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            snapshot,
            disabled,
            reset,
            mods: ModifierState::default(),
            hotkey: HotkeyMatcher::new(),
            autotext,
            dispatch,
        }
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn autotext(&self) -> &AutotextMatcher {
        &self.autotext
    }

    pub fn hotkey(&self) -> &HotkeyMatcher {
        &self.hotkey
    }

    /// Runs both matchers for one event. Never panics; a panic inside is
    /// logged and the event passes through.
    pub fn hook(&mut self, ev: &KeyEvent) -> HookDecision {
        match panic::catch_unwind(AssertUnwindSafe(|| self.hook_pass(ev))) {
            Ok(decision) => decision,
            Err(_) => {
                error!(vk = %ev.vk, up = ev.up, "hook pass panicked, event passed through");
                self.restart();
                HookDecision::pass()
            }
        }
    }

    fn hook_pass(&mut self, ev: &KeyEvent) -> HookDecision {
        let mod_this = self.mods.apply(ev.vk, ev.up);

        // keys sent by actions must not retrigger, nor extend typed text
        if ev.injected_by_self {
            trace!(vk = %ev.vk, "own injected event");
            self.reset.request();
            return HookDecision::pass();
        }
        if self.reset.take() {
            debug!("autotext reset requested");
            self.autotext.reset();
        }

        let mut ctx = HookContext::new(ev, &self.mods, mod_this);
        let disabled = self.disabled.load(Ordering::Relaxed);

        let eat = self.hotkey.hook_proc(ev, &mut ctx, &self.snapshot.hotkeys, disabled);
        if eat || ctx.trigger().is_some() {
            self.autotext.reset();
        } else {
            self.autotext
                .hook_proc(ev, &mut ctx, &self.snapshot.autotexts, disabled);
        }

        let decision = HookDecision {
            eat,
            menu_guard: ctx.menu_guard,
            fired: ctx.trigger().map(|t| t.id),
        };
        if let Some(fired) = ctx.take_fired() {
            debug!(trigger = %fired.trigger, mute = ?fired.mute, "dispatching trigger");
            self.dispatch.dispatch(fired);
        }
        decision
    }

    /// Forgets all cross-event state
    pub fn restart(&mut self) {
        self.mods.clear();
        self.hotkey.reset();
        self.autotext.restart();
    }
}
