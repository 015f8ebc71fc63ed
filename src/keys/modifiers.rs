//! Modifier key definitions and state tracking
//!
//! Provides the modifier bit set used by hotkey masks and a tracker that
//! follows left/right modifier presses across hook events.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::codes::Key;

bitflags::bitflags! {
    /// Modifier key mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 1;
        const CTRL = 2;
        const ALT = 4;
        const WIN = 8;
    }
}

impl Modifiers {
    /// Only `Alt`, only `Win`, or `Alt+Win`: combinations whose release
    /// would open the OS menu or start menu
    pub fn is_menu_only(self) -> bool {
        !self.is_empty() && (self & !(Modifiers::ALT | Modifiers::WIN)).is_empty()
    }
}

impl fmt::Display for Modifiers {
    /// Formats like `Ctrl+Alt+Shift+Win`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in [
            (Modifiers::CTRL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::WIN, "Win"),
        ] {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Tracks which modifier keys are currently pressed, per side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Modifiers held with a left-side (or side-less) key
    pub left: Modifiers,
    /// Modifiers held with a right-side key
    pub right: Modifiers,
}

impl ModifierState {
    /// Applies a key event and returns the modifier of that key, empty for
    /// non-modifier keys
    pub fn apply(&mut self, key: Key, up: bool) -> Modifiers {
        let m = key.modifier();
        if m.is_empty() {
            return m;
        }
        let side = if key.is_right_modifier() {
            &mut self.right
        } else {
            &mut self.left
        };
        side.set(m, !up);
        m
    }

    /// All currently pressed modifiers
    pub fn mods(&self) -> Modifiers {
        self.left | self.right
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        self.mods().is_empty()
    }

    /// Forget all pressed modifiers
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
