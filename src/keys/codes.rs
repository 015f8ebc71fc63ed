//! Virtual key codes
//!
//! The engine speaks the Windows virtual-key namespace, which is also what
//! most cross-platform hook shims translate to. Only the codes the matchers
//! and the hotkey parser care about get named constants.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::modifiers::Modifiers;

/// A virtual key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub u8);

impl Key {
    pub const BACK: Key = Key(0x08);
    pub const TAB: Key = Key(0x09);
    pub const CLEAR: Key = Key(0x0C);
    pub const ENTER: Key = Key(0x0D);
    pub const SHIFT: Key = Key(0x10);
    pub const CTRL: Key = Key(0x11);
    pub const ALT: Key = Key(0x12);
    pub const PAUSE: Key = Key(0x13);
    pub const CAPS_LOCK: Key = Key(0x14);
    pub const ESCAPE: Key = Key(0x1B);
    pub const SPACE: Key = Key(0x20);
    pub const PAGE_UP: Key = Key(0x21);
    pub const PAGE_DOWN: Key = Key(0x22);
    pub const END: Key = Key(0x23);
    pub const HOME: Key = Key(0x24);
    pub const LEFT: Key = Key(0x25);
    pub const UP: Key = Key(0x26);
    pub const RIGHT: Key = Key(0x27);
    pub const DOWN: Key = Key(0x28);
    pub const PRINT_SCREEN: Key = Key(0x2C);
    pub const INSERT: Key = Key(0x2D);
    pub const DELETE: Key = Key(0x2E);
    pub const LWIN: Key = Key(0x5B);
    pub const RWIN: Key = Key(0x5C);
    pub const APPS: Key = Key(0x5D);
    pub const SLEEP: Key = Key(0x5F);
    pub const NUMPAD0: Key = Key(0x60);
    pub const MULTIPLY: Key = Key(0x6A);
    pub const ADD: Key = Key(0x6B);
    pub const SUBTRACT: Key = Key(0x6D);
    pub const DECIMAL: Key = Key(0x6E);
    pub const DIVIDE: Key = Key(0x6F);
    pub const F1: Key = Key(0x70);
    pub const NUM_LOCK: Key = Key(0x90);
    pub const SCROLL_LOCK: Key = Key(0x91);
    pub const LSHIFT: Key = Key(0xA0);
    pub const RSHIFT: Key = Key(0xA1);
    pub const LCTRL: Key = Key(0xA2);
    pub const RCTRL: Key = Key(0xA3);
    pub const LALT: Key = Key(0xA4);
    pub const RALT: Key = Key(0xA5);
    pub const OEM_1: Key = Key(0xBA); // ;:
    pub const OEM_PLUS: Key = Key(0xBB); // =+
    pub const OEM_COMMA: Key = Key(0xBC); // ,<
    pub const OEM_MINUS: Key = Key(0xBD); // -_
    pub const OEM_PERIOD: Key = Key(0xBE); // .>
    pub const OEM_2: Key = Key(0xBF); // /?
    pub const OEM_3: Key = Key(0xC0); // `~
    pub const OEM_4: Key = Key(0xDB); // [{
    pub const OEM_5: Key = Key(0xDC); // \|
    pub const OEM_6: Key = Key(0xDD); // ]}
    pub const OEM_7: Key = Key(0xDE); // '"
    /// Injected Unicode character; the character is in the scan code.
    pub const PACKET: Key = Key(0xE7);

    /// The letter key `A`..`Z` for an ASCII letter of either case
    pub fn letter(c: char) -> Option<Key> {
        c.is_ascii_alphabetic()
            .then(|| Key(c.to_ascii_uppercase() as u8))
    }

    /// The main-block digit key for an ASCII digit
    pub fn digit(c: char) -> Option<Key> {
        c.is_ascii_digit().then(|| Key(c as u8))
    }

    /// Function key `F1`..`F24`
    pub fn function(n: u8) -> Option<Key> {
        (1..=24).contains(&n).then(|| Key(Self::F1.0 + n - 1))
    }

    /// The modifier this key represents, or empty for non-modifier keys
    pub fn modifier(self) -> Modifiers {
        match self {
            Self::SHIFT | Self::LSHIFT | Self::RSHIFT => Modifiers::SHIFT,
            Self::CTRL | Self::LCTRL | Self::RCTRL => Modifiers::CTRL,
            Self::ALT | Self::LALT | Self::RALT => Modifiers::ALT,
            Self::LWIN | Self::RWIN => Modifiers::WIN,
            _ => Modifiers::empty(),
        }
    }

    /// Whether this is one of the right-side modifier keys
    pub fn is_right_modifier(self) -> bool {
        matches!(self, Self::RSHIFT | Self::RCTRL | Self::RALT | Self::RWIN)
    }

    /// Side-less `Shift`, `Ctrl` or `Alt`
    pub fn is_generic_modifier(self) -> bool {
        matches!(self, Self::SHIFT | Self::CTRL | Self::ALT)
    }

    /// Page Up/Down, End, Home and the arrows
    pub fn is_navigation(self) -> bool {
        (Self::PAGE_UP.0..=Self::DOWN.0).contains(&self.0)
    }

    /// Keys that exist both on the numeric keypad and in the main block
    pub fn has_numpad_twin(self) -> bool {
        self == Self::ENTER || self.is_navigation() || self == Self::INSERT || self == Self::DELETE
    }

    /// Looks up a key by name, as used in hotkey strings.
    ///
    /// Accepts single letters (either case), digits and the US punctuation
    /// characters, the names listed in [`NAMED_KEYS`], `F1`..`F24`,
    /// `Numpad0`..`Numpad9` and `VK<decimal>`.
    pub fn from_name(name: &str) -> Option<Key> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::letter(c)
                .or_else(|| Self::digit(c))
                .or_else(|| Self::from_punctuation(c));
        }

        if let Some((_, key)) = NAMED_KEYS.iter().find(|(n, _)| *n == name) {
            return Some(*key);
        }
        if let Some((_, key)) = ALIASES.iter().find(|(n, _)| *n == name) {
            return Some(*key);
        }
        if let Some(n) = name.strip_prefix('F').and_then(|s| s.parse::<u8>().ok()) {
            return Self::function(n);
        }
        if let Some(n) = name.strip_prefix("Numpad").and_then(|s| s.parse::<u8>().ok()) {
            return (n <= 9).then(|| Key(Self::NUMPAD0.0 + n));
        }
        if let Some(n) = name.strip_prefix("VK").and_then(|s| s.parse::<u8>().ok()) {
            return (n != 0).then_some(Key(n));
        }
        None
    }

    fn from_punctuation(c: char) -> Option<Key> {
        let key = match c {
            ';' => Self::OEM_1,
            '=' => Self::OEM_PLUS,
            ',' => Self::OEM_COMMA,
            '-' => Self::OEM_MINUS,
            '.' => Self::OEM_PERIOD,
            '/' => Self::OEM_2,
            '`' => Self::OEM_3,
            '[' => Self::OEM_4,
            '\\' => Self::OEM_5,
            ']' => Self::OEM_6,
            '\'' => Self::OEM_7,
            _ => return None,
        };
        Some(key)
    }

    /// Canonical name, the inverse of [`Key::from_name`]
    pub fn name(self) -> String {
        if let Some((n, _)) = NAMED_KEYS.iter().find(|(_, k)| *k == self) {
            return (*n).to_string();
        }
        match self.0 {
            b @ (b'0'..=b'9' | b'A'..=b'Z') => char::from(b).to_string(),
            b @ 0x60..=0x69 => format!("Numpad{}", b - 0x60),
            b @ 0x70..=0x87 => format!("F{}", b - 0x70 + 1),
            0xBA => ";".into(),
            0xBB => "=".into(),
            0xBC => ",".into(),
            0xBD => "-".into(),
            0xBE => ".".into(),
            0xBF => "/".into(),
            0xC0 => "`".into(),
            0xDB => "[".into(),
            0xDC => "\\".into(),
            0xDD => "]".into(),
            0xDE => "'".into(),
            b => format!("VK{b}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Canonical key names. Names are case-sensitive.
pub const NAMED_KEYS: &[(&str, Key)] = &[
    ("Back", Key::BACK),
    ("Tab", Key::TAB),
    ("Clear", Key::CLEAR),
    ("Enter", Key::ENTER),
    ("Shift", Key::SHIFT),
    ("Ctrl", Key::CTRL),
    ("Alt", Key::ALT),
    ("Pause", Key::PAUSE),
    ("CapsLock", Key::CAPS_LOCK),
    ("Esc", Key::ESCAPE),
    ("Space", Key::SPACE),
    ("PgUp", Key::PAGE_UP),
    ("PgDn", Key::PAGE_DOWN),
    ("End", Key::END),
    ("Home", Key::HOME),
    ("Left", Key::LEFT),
    ("Up", Key::UP),
    ("Right", Key::RIGHT),
    ("Down", Key::DOWN),
    ("PrtSc", Key::PRINT_SCREEN),
    ("Ins", Key::INSERT),
    ("Del", Key::DELETE),
    ("Win", Key::LWIN),
    ("RWin", Key::RWIN),
    ("Apps", Key::APPS),
    ("Sleep", Key::SLEEP),
    ("Multiply", Key::MULTIPLY),
    ("Add", Key::ADD),
    ("Subtract", Key::SUBTRACT),
    ("Decimal", Key::DECIMAL),
    ("Divide", Key::DIVIDE),
    ("NumLock", Key::NUM_LOCK),
    ("ScrollLock", Key::SCROLL_LOCK),
    ("LShift", Key::LSHIFT),
    ("RShift", Key::RSHIFT),
    ("LCtrl", Key::LCTRL),
    ("RCtrl", Key::RCTRL),
    ("LAlt", Key::LALT),
    ("RAlt", Key::RALT),
    ("Packet", Key::PACKET),
];

const ALIASES: &[(&str, Key)] = &[
    ("Backspace", Key::BACK),
    ("Escape", Key::ESCAPE),
    ("PageUp", Key::PAGE_UP),
    ("PageDown", Key::PAGE_DOWN),
    ("Insert", Key::INSERT),
    ("Delete", Key::DELETE),
    ("LWin", Key::LWIN),
    ("Menu", Key::APPS),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_char_names() {
        assert_eq!(Key::from_name("a"), Some(Key(b'A')));
        assert_eq!(Key::from_name("K"), Some(Key(b'K')));
        assert_eq!(Key::from_name("7"), Some(Key(b'7')));
        assert_eq!(Key::from_name("."), Some(Key::OEM_PERIOD));
        assert_eq!(Key::from_name("+"), None);
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(Key::from_name("F11"), Some(Key(0x7A)));
        assert_eq!(Key::from_name("F25"), None);
        assert_eq!(Key::from_name("Numpad5"), Some(Key(0x65)));
        assert_eq!(Key::from_name("PageUp"), Some(Key::PAGE_UP));
        assert_eq!(Key::from_name("VK200"), Some(Key(200)));
        assert_eq!(Key::from_name("tab"), None);
        assert_eq!(Key::from_name("NoSuchKey"), None);
    }

    #[test]
    fn test_name_roundtrip_for_common_keys() {
        for key in [Key::ENTER, Key(b'Q'), Key(0x7B), Key(0x63), Key::OEM_7, Key::LCTRL] {
            assert_eq!(Key::from_name(&key.name()), Some(key), "{key:?}");
        }
    }

    #[test]
    fn test_modifier_keys() {
        assert_eq!(Key::LCTRL.modifier(), Modifiers::CTRL);
        assert_eq!(Key::RWIN.modifier(), Modifiers::WIN);
        assert!(Key(b'A').modifier().is_empty());
        assert!(Key::RALT.is_right_modifier());
        assert!(!Key::LALT.is_right_modifier());
    }

    #[test]
    fn test_numpad_twins() {
        assert!(Key::ENTER.has_numpad_twin());
        assert!(Key::HOME.has_numpad_twin());
        assert!(Key::DELETE.has_numpad_twin());
        assert!(!Key::TAB.has_numpad_twin());
    }
}
