//! Key codes, modifier masks and hotkey strings

mod codes;
mod modifiers;
mod parse;

pub use codes::{Key, NAMED_KEYS};
pub use modifiers::{ModifierState, Modifiers};
pub use parse::{parse_hotkey, ParsedHotkey};
