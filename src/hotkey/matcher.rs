//! Hotkey matching on the hook thread
//!
//! State per hook session: at most one armed (`KeyModUp`) trigger waiting
//! for the chord to be released, and at most one key whose key-up must be
//! swallowed because its key-down fired a trigger.

use std::sync::Arc;

use tracing::trace;

use crate::args::{HotkeyArgs, TriggerArgs};
use crate::context::{HookContext, KeyEvent, MuteMods};
use crate::keys::Key;
use crate::registry::{Registry, TriggerDef, TriggerKind};

use super::trigger::HotkeyFlags;

/// Observable state of the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordState {
    /// Nothing pending
    Idle,
    /// A `KeyModUp` trigger waits for the key and all modifiers to be released
    Armed,
    /// The key-up of this key will be swallowed
    Eaten(Key),
}

struct Armed {
    trigger: Arc<TriggerDef>,
    args: TriggerArgs,
    /// The trigger key while it is still down
    key: Option<Key>,
}

/// Matches key-down events against hotkey definitions
#[derive(Default)]
pub struct HotkeyMatcher {
    armed: Option<Armed>,
    eat_up: Option<Key>,
}

impl HotkeyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; called on start and stop
    pub fn reset(&mut self) {
        self.armed = None;
        self.eat_up = None;
    }

    pub fn state(&self) -> ChordState {
        match (&self.armed, self.eat_up) {
            (Some(_), _) => ChordState::Armed,
            (None, Some(key)) => ChordState::Eaten(key),
            (None, None) => ChordState::Idle,
        }
    }

    /// Processes one event. Returns `true` to swallow it.
    ///
    /// On a match the trigger and its arguments are stored in `ctx`.
    pub fn hook_proc(
        &mut self,
        ev: &KeyEvent,
        ctx: &mut HookContext,
        registry: &Registry,
        disabled_all: bool,
    ) -> bool {
        let key = ev.vk;
        let mods = ctx.mods;
        if !ev.up {
            self.armed = None;
        }

        if !ctx.mod_this.is_empty() {
            // modifier released: fire the armed trigger once the chord is fully up
            if mods.is_empty() && self.armed.as_ref().is_some_and(|a| a.key.is_none()) {
                self.fire_armed(ctx);
            }
            return false;
        }

        if ev.up {
            if let Some(armed) = self.armed.as_mut().filter(|a| a.key == Some(key)) {
                armed.key = None;
                if mods.is_empty() {
                    self.fire_armed(ctx);
                }
            }
            if self.eat_up == Some(key) {
                self.eat_up = None;
                return true;
            }
            return false;
        }

        self.eat_up = None;
        for def in registry.bucket(u32::from(key.0)) {
            let TriggerKind::Hotkey(x) = &def.kind else {
                continue;
            };
            if !x.mods_match(mods) {
                continue;
            }

            let flags = x.flags;
            let numpad = flags & (HotkeyFlags::NUMPAD | HotkeyFlags::NUMPAD_NOT);
            if !numpad.is_empty() && key.has_numpad_twin() {
                // numpad Enter is extended, the numpad navigation keys are not
                if (ev.extended ^ (key == Key::ENTER)) == flags.contains(HotkeyFlags::NUMPAD) {
                    continue;
                }
            }
            if flags.contains(HotkeyFlags::EXTENDED_YES) && !ev.extended {
                continue;
            }
            if flags.contains(HotkeyFlags::EXTENDED_NO) && ev.extended {
                continue;
            }
            if flags.contains(HotkeyFlags::LEFT_MOD) && ctx.mods_left != mods {
                continue;
            }
            if flags.contains(HotkeyFlags::RIGHT_MOD) && ctx.mods_right != mods {
                continue;
            }

            if disabled_all || def.is_disabled() {
                continue;
            }

            let args = TriggerArgs::Hotkey(HotkeyArgs {
                trigger: def.id,
                window: ctx.window,
                key,
                mods,
            });
            if !def.scope_accepts(&args, ctx) {
                continue;
            }

            trace!(trigger = %def, "hotkey matched");
            let mut fired = false;
            if def.has_action() {
                if flags.contains(HotkeyFlags::KEY_MOD_UP) {
                    self.armed = Some(Armed {
                        trigger: Arc::clone(def),
                        args,
                        key: Some(key),
                    });
                } else {
                    ctx.set_fired(Arc::clone(def), args);
                    fired = true;
                }
            }

            if flags.contains(HotkeyFlags::SHARE_EVENT) {
                return false;
            }

            if !fired {
                // armed or action-less: the swallowed key must not leave Alt/Win alone
                if mods.is_menu_only() {
                    ctx.menu_guard = true;
                }
            } else if !mods.is_empty() {
                if !flags.contains(HotkeyFlags::NO_MOD_OFF) {
                    ctx.mute_mods = MuteMods::Release;
                } else if mods.is_menu_only() {
                    ctx.mute_mods = MuteMods::TapCtrl;
                }
            }

            self.eat_up = Some(key);
            return true;
        }
        false
    }

    fn fire_armed(&mut self, ctx: &mut HookContext) {
        if let Some(armed) = self.armed.take() {
            trace!(trigger = %armed.trigger, "armed hotkey released");
            ctx.set_fired(armed.trigger, armed.args);
        }
    }
}
