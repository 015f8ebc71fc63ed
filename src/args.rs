//! Arguments handed to trigger actions and scope predicates

use serde::{Deserialize, Serialize};

use crate::autotext::AutotextFlags;
use crate::context::WindowId;
use crate::keys::{Key, Modifiers};
use crate::registry::TriggerId;

/// Arguments of a matched trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerArgs {
    Hotkey(HotkeyArgs),
    Autotext(AutotextArgs),
}

impl TriggerArgs {
    pub fn trigger(&self) -> TriggerId {
        match self {
            TriggerArgs::Hotkey(a) => a.trigger,
            TriggerArgs::Autotext(a) => a.trigger,
        }
    }

    pub fn window(&self) -> Option<WindowId> {
        match self {
            TriggerArgs::Hotkey(a) => a.window,
            TriggerArgs::Autotext(a) => a.window,
        }
    }

    pub fn as_autotext(&self) -> Option<&AutotextArgs> {
        match self {
            TriggerArgs::Autotext(a) => Some(a),
            TriggerArgs::Hotkey(_) => None,
        }
    }
}

/// Arguments of a hotkey trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyArgs {
    pub trigger: TriggerId,
    /// The active window
    pub window: Option<WindowId>,
    /// The pressed key
    pub key: Key,
    /// The pressed modifiers; useful when the trigger ignores some
    pub mods: Modifiers,
}

/// Arguments of an autotext trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutotextArgs {
    pub trigger: TriggerId,
    /// The active window
    pub window: Option<WindowId>,
    /// The user-typed text; ends with the postfix character when
    /// `has_postfix_char` is set
    pub text: String,
    pub has_postfix_char: bool,
    /// Select typed text with `Shift+Left` instead of erasing it
    pub shift_left: bool,
    pub flags: AutotextFlags,
}

impl AutotextArgs {
    /// The postfix delimiter character, if the user typed one
    pub fn postfix_char(&self) -> Option<char> {
        if self.has_postfix_char {
            self.text.chars().last()
        } else {
            None
        }
    }
}
