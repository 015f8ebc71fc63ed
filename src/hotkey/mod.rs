//! Hotkey triggers
//!
//! Matches key-down events plus the modifier state against registered
//! key/modifier combinations.

mod matcher;
mod trigger;

pub use matcher::{ChordState, HotkeyMatcher};
pub use trigger::{HotkeyFlags, HotkeyTrigger};
