//! Hotkey string parsing
//!
//! Grammar: zero to four modifiers and one non-modifier key joined with
//! `+`, whitespace around tokens ignored. A modifier followed by `?` is
//! "don't care" (`"Ctrl?+K"`), and a leading bare `?` makes every modifier
//! don't care (`"?+F11"`).

use super::codes::Key;
use super::modifiers::Modifiers;

/// A parsed hotkey string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHotkey {
    /// Modifiers that must be pressed
    pub mods: Modifiers,
    /// Modifiers whose state is ignored
    pub any: Modifiers,
    /// The non-modifier key; `None` when parsed with `no_key`
    pub key: Option<Key>,
}

/// Parses a hotkey string like `"Ctrl+Shift?+K"`.
///
/// With `no_key` the string must contain modifiers only (`"Ctrl+Alt"`), as
/// used when the key is passed separately. Returns `None` for any syntax
/// error, unknown key name, repeated modifier or misplaced key.
pub fn parse_hotkey(s: &str, no_key: bool) -> Option<ParsedHotkey> {
    let mut parsed = ParsedHotkey {
        mods: Modifiers::empty(),
        any: Modifiers::empty(),
        key: None,
    };
    if s.trim().is_empty() {
        return no_key.then_some(parsed);
    }

    for (i, token) in s.split('+').enumerate() {
        // a key must be the last token
        if parsed.key.is_some() {
            return None;
        }
        let token = token.trim();
        if i == 0 && token == "?" {
            parsed.any = Modifiers::all();
            continue;
        }
        let (name, ignore) = match token.strip_suffix('?') {
            Some(name) => (name.trim_end(), true),
            None => (token, false),
        };
        let key = Key::from_name(name)?;
        let m = key.modifier();
        if m.is_empty() {
            if ignore {
                return None;
            }
            parsed.key = Some(key);
        } else {
            if (parsed.mods | parsed.any).intersects(m) {
                return None;
            }
            if ignore {
                parsed.any |= m;
            } else {
                parsed.mods |= m;
            }
        }
    }

    if no_key {
        let has_mods = !(parsed.mods | parsed.any).is_empty();
        (has_mods && parsed.key.is_none()).then_some(parsed)
    } else {
        parsed.key.is_some().then_some(parsed)
    }
}
