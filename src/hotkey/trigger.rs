//! Hotkey trigger definitions

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriggerError};
use crate::keys::{Key, Modifiers};

bitflags::bitflags! {
    /// Flags of hotkey triggers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct HotkeyFlags: u16 {
        /// Let other hooks and apps receive the key-down event too
        const SHARE_EVENT = 1;
        /// Run the action when the key and all modifiers are released
        const KEY_MOD_UP = 2;
        /// Works only with left-side modifier keys
        const LEFT_MOD = 4;
        /// Works only with right-side modifier keys
        const RIGHT_MOD = 8;
        /// Don't release modifier keys before the action
        const NO_MOD_OFF = 16;
        /// The key must be an extended key
        const EXTENDED_YES = 32;
        /// The key must not be an extended key
        const EXTENDED_NO = 64;
        /// Only the numeric keypad twin of Enter, Home, End, PgUp, PgDn,
        /// the arrows, Ins and Del
        const NUMPAD = 128;
        /// Only the main-block twin of those keys
        const NUMPAD_NOT = 0x100;
    }
}

impl HotkeyFlags {
    /// Parses a flag name like `"KeyModUp"`
    pub fn parse_name(name: &str) -> Option<HotkeyFlags> {
        let flag = match name {
            "ShareEvent" => Self::SHARE_EVENT,
            "KeyModUp" => Self::KEY_MOD_UP,
            "LeftMod" => Self::LEFT_MOD,
            "RightMod" => Self::RIGHT_MOD,
            "NoModOff" => Self::NO_MOD_OFF,
            "ExtendedYes" => Self::EXTENDED_YES,
            "ExtendedNo" => Self::EXTENDED_NO,
            "Numpad" => Self::NUMPAD,
            "NumpadNot" => Self::NUMPAD_NOT,
            _ => return None,
        };
        Some(flag)
    }
}

/// Payload of a hotkey definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyTrigger {
    pub key: Key,
    pub flags: HotkeyFlags,
    /// Modifier bits that take part in matching (complement of don't-care)
    mod_mask: Modifiers,
    /// Required value of the bits in `mod_mask`
    mod_masked: Modifiers,
    params: String,
}

impl HotkeyTrigger {
    /// Builds a definition from required and don't-care modifiers.
    ///
    /// Rejects side flags without any modifier and mutually exclusive flag
    /// pairs.
    pub fn new(
        key: Key,
        mods: Modifiers,
        any: Modifiers,
        flags: HotkeyFlags,
        hotkey: &str,
    ) -> Result<Self> {
        if mods.is_empty() && flags.intersects(HotkeyFlags::LEFT_MOD | HotkeyFlags::RIGHT_MOD) {
            return Err(TriggerError::InvalidFlags("LeftMod/RightMod need a modifier"));
        }
        for (pair, what) in [
            (HotkeyFlags::LEFT_MOD | HotkeyFlags::RIGHT_MOD, "LeftMod with RightMod"),
            (HotkeyFlags::EXTENDED_YES | HotkeyFlags::EXTENDED_NO, "ExtendedYes with ExtendedNo"),
            (HotkeyFlags::NUMPAD | HotkeyFlags::NUMPAD_NOT, "Numpad with NumpadNot"),
        ] {
            if flags.contains(pair) {
                return Err(TriggerError::InvalidFlags(what));
            }
        }
        if !key.modifier().is_empty() {
            return Err(TriggerError::InvalidHotkey(hotkey.to_string()));
        }

        let mod_mask = !any & Modifiers::all();
        let params = if flags.is_empty() {
            hotkey.to_string()
        } else {
            let names: Vec<&str> = flags.iter_names().map(|(name, _)| name).collect();
            format!("{hotkey} ({})", names.join(" | "))
        };
        Ok(Self {
            key,
            flags,
            mod_mask,
            mod_masked: mods & mod_mask,
            params,
        })
    }

    /// Whether the modifier state satisfies the required/don't-care masks
    pub fn mods_match(&self, mods: Modifiers) -> bool {
        mods & self.mod_mask == self.mod_masked
    }

    /// The modifiers that must be pressed
    pub fn required(&self) -> Modifiers {
        self.mod_masked
    }

    /// The modifiers whose state is ignored
    pub fn dont_care(&self) -> Modifiers {
        !self.mod_mask & Modifiers::all()
    }

    /// The hotkey string as registered, plus flags
    pub fn params(&self) -> &str {
        &self.params
    }
}
