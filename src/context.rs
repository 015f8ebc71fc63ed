//! Hook input events and the per-event context shared by the matchers

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::args::TriggerArgs;
use crate::dispatch::Fired;
use crate::keys::{Key, ModifierState, Modifiers};
use crate::registry::TriggerDef;

/// Opaque native window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

/// Opaque keyboard layout handle of the focused thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutId(pub u32);

impl LayoutId {
    /// English (United States)
    pub const US: LayoutId = LayoutId(0x0409);
    /// English (United States, International), with dead keys
    pub const US_INTERNATIONAL: LayoutId = LayoutId(0x2_0409);
}

/// A raw low-level keyboard event as delivered by the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub vk: Key,
    #[serde(default)]
    pub scan: u32,
    #[serde(default)]
    pub up: bool,
    /// Hardware "extended key" bit
    #[serde(default)]
    pub extended: bool,
    /// Injected by any software
    #[serde(default)]
    pub injected: bool,
    /// Injected by this engine's own dispatcher; never matched
    #[serde(default)]
    pub injected_by_self: bool,
    /// CapsLock toggle state at the time of the event
    #[serde(default)]
    pub caps_lock: bool,
    /// Active (foreground) window
    #[serde(default)]
    pub window: Option<WindowId>,
    /// Focused window; `None` while a menu or move/size loop is active
    #[serde(default)]
    pub focus: Option<WindowId>,
    /// Keyboard layout of the focused thread
    #[serde(default)]
    pub layout: Option<LayoutId>,
}

impl KeyEvent {
    pub fn down(vk: Key) -> Self {
        Self {
            vk,
            scan: 0,
            up: false,
            extended: false,
            injected: false,
            injected_by_self: false,
            caps_lock: false,
            window: None,
            focus: None,
            layout: None,
        }
    }

    pub fn up(vk: Key) -> Self {
        Self { up: true, ..Self::down(vk) }
    }

    /// Sets both the active and the focused window
    pub fn in_window(mut self, w: WindowId) -> Self {
        self.window = Some(w);
        self.focus = Some(w);
        self
    }

    pub fn with_layout(mut self, layout: LayoutId) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_scan(mut self, scan: u32) -> Self {
        self.scan = scan;
        self
    }

    pub fn extended(mut self, yes: bool) -> Self {
        self.extended = yes;
        self
    }
}

/// What the dispatcher should do with still-pressed modifier keys before
/// running the action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuteMods {
    #[default]
    None,
    /// Synthesize key-up for all pressed modifiers
    Release,
    /// Tap `Ctrl` so a held `Alt`/`Win` does not open a menu on release
    TapCtrl,
}

/// Per-event context: modifier state on input, matched trigger on output
#[derive(Debug, Default)]
pub struct HookContext {
    /// Modifiers pressed after applying this event
    pub mods: Modifiers,
    /// Modifiers pressed with left-side keys
    pub mods_left: Modifiers,
    /// Modifiers pressed with right-side keys
    pub mods_right: Modifiers,
    /// The modifier this event's key represents, empty for other keys
    pub mod_this: Modifiers,
    /// Active window
    pub window: Option<WindowId>,

    pub(crate) trigger: Option<Arc<TriggerDef>>,
    pub(crate) args: Option<TriggerArgs>,
    /// Modifier release instruction for the dispatcher
    pub mute_mods: MuteMods,
    /// Tap `Ctrl` now, synchronously, to keep `Alt`/`Win` from activating
    /// the OS menu after the matched key was swallowed
    pub menu_guard: bool,
}

impl HookContext {
    pub fn new(event: &KeyEvent, mods: &ModifierState, mod_this: Modifiers) -> Self {
        Self {
            mods: mods.mods(),
            mods_left: mods.left,
            mods_right: mods.right,
            mod_this,
            window: event.window,
            ..Self::default()
        }
    }

    /// The trigger matched during this hook pass
    pub fn trigger(&self) -> Option<&Arc<TriggerDef>> {
        self.trigger.as_ref()
    }

    /// Arguments of the trigger matched during this hook pass
    pub fn args(&self) -> Option<&TriggerArgs> {
        self.args.as_ref()
    }

    pub(crate) fn set_fired(&mut self, trigger: Arc<TriggerDef>, args: TriggerArgs) {
        self.trigger = Some(trigger);
        self.args = Some(args);
    }

    /// Moves the matched trigger out for dispatch
    pub fn take_fired(&mut self) -> Option<Fired> {
        let trigger = self.trigger.take()?;
        let args = self.args.take()?;
        Some(Fired {
            trigger,
            args,
            mute: self.mute_mods,
        })
    }
}
