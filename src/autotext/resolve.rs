//! Key-to-character resolution with dead keys
//!
//! The conversion itself sits behind [`KeyTranslator`], the boundary to the
//! platform's layout tables. [`KeyResolver`] owns the pending dead key and
//! replays it into the next conversion so accented characters come out
//! combined.

use crate::context::LayoutId;
use crate::keys::{Key, Modifiers};

/// One key press to convert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub vk: Key,
    pub scan: u32,
    pub mods: Modifiers,
    pub caps_lock: bool,
    pub layout: LayoutId,
}

/// A dead key waiting for the next character key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadKey {
    pub vk: Key,
    pub mods: Modifiers,
    pub scan: u32,
    pub layout: LayoutId,
}

impl From<KeyInput> for DeadKey {
    fn from(k: KeyInput) -> Self {
        Self {
            vk: k.vk,
            mods: k.mods,
            scan: k.scan,
            layout: k.layout,
        }
    }
}

/// Result of converting one key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// Not a character key in this layout
    None,
    /// A dead key; the character comes with the next key
    Dead,
    One(char),
    /// A dead key that did not combine, followed by the new character
    Two(char, char),
}

impl Translation {
    pub fn chars(self) -> impl Iterator<Item = char> {
        let pair = match self {
            Translation::One(a) => [Some(a), None],
            Translation::Two(a, b) => [Some(a), Some(b)],
            Translation::None | Translation::Dead => [None, None],
        };
        pair.into_iter().flatten()
    }
}

/// Layout-aware key to character conversion.
///
/// `dead` is the pending dead key of the same layout, if any; the
/// translator combines it with `key` as typing them in sequence would.
pub trait KeyTranslator: Send {
    fn translate(&self, key: KeyInput, dead: Option<&DeadKey>) -> Translation;
}

/// Converts key presses and tracks the pending dead key
pub struct KeyResolver {
    translator: Box<dyn KeyTranslator>,
    dead: Option<DeadKey>,
}

impl KeyResolver {
    pub fn new(translator: Box<dyn KeyTranslator>) -> Self {
        Self {
            translator,
            dead: None,
        }
    }

    pub fn resolve(&mut self, key: KeyInput) -> Translation {
        // a dead key typed in another layout does not carry over
        let dead = self.dead.take().filter(|d| d.layout == key.layout);
        let t = self.translator.translate(key, dead.as_ref());
        if t == Translation::Dead {
            self.dead = Some(key.into());
        }
        t
    }

    pub fn pending(&self) -> Option<&DeadKey> {
        self.dead.as_ref()
    }

    pub fn clear(&mut self) {
        self.dead = None;
    }
}

/// Built-in translator for the US and US-International layouts.
///
/// US-International has dead `'`, `` ` ``, `"`, `~` and `^`. Any other
/// layout converts nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableTranslator;

impl TableTranslator {
    pub fn supports(layout: LayoutId) -> bool {
        layout == LayoutId::US || layout == LayoutId::US_INTERNATIONAL
    }

    fn base_char(vk: Key, shift: bool, caps: bool) -> Option<char> {
        let b = vk.0;
        let c = match b {
            b'A'..=b'Z' => {
                let c = char::from(b);
                return Some(if shift != caps { c } else { c.to_ascii_lowercase() });
            }
            b'0'..=b'9' if shift => char::from(b")!@#$%^&*("[usize::from(b - b'0')]),
            b'0'..=b'9' => char::from(b),
            0x60..=0x69 => char::from(b'0' + b - 0x60),
            _ => {
                let (plain, shifted) = match vk {
                    Key::SPACE => (' ', ' '),
                    Key::MULTIPLY => ('*', '*'),
                    Key::ADD => ('+', '+'),
                    Key::SUBTRACT => ('-', '-'),
                    Key::DECIMAL => ('.', '.'),
                    Key::DIVIDE => ('/', '/'),
                    Key::OEM_1 => (';', ':'),
                    Key::OEM_PLUS => ('=', '+'),
                    Key::OEM_COMMA => (',', '<'),
                    Key::OEM_MINUS => ('-', '_'),
                    Key::OEM_PERIOD => ('.', '>'),
                    Key::OEM_2 => ('/', '?'),
                    Key::OEM_3 => ('`', '~'),
                    Key::OEM_4 => ('[', '{'),
                    Key::OEM_5 => ('\\', '|'),
                    Key::OEM_6 => (']', '}'),
                    Key::OEM_7 => ('\'', '"'),
                    _ => return None,
                };
                if shift {
                    shifted
                } else {
                    plain
                }
            }
        };
        Some(c)
    }

    /// Control characters typed by editing keys and `Ctrl+letter`
    fn control_char(vk: Key, mods: Modifiers) -> Option<char> {
        // Ctrl+Alt is AltGr
        let ctrl = mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT);
        let c = match vk {
            Key::BACK if ctrl => '\x7f',
            Key::BACK => '\x08',
            Key::TAB if !ctrl => '\t',
            Key::ENTER if ctrl => '\n',
            Key::ENTER => '\r',
            Key::ESCAPE => '\x1b',
            Key(b @ b'A'..=b'Z') if ctrl => char::from(b - 0x40),
            _ => return None,
        };
        Some(c)
    }

    /// The accent of a US-International dead key
    fn dead_accent(vk: Key, shift: bool) -> Option<char> {
        match (vk, shift) {
            (Key::OEM_7, false) => Some('\''),
            (Key::OEM_7, true) => Some('"'),
            (Key::OEM_3, false) => Some('`'),
            (Key::OEM_3, true) => Some('~'),
            (Key(b'6'), true) => Some('^'),
            _ => None,
        }
    }

    fn compose(accent: char, c: char) -> Option<char> {
        let lower = c.to_ascii_lowercase();
        let composed = match (accent, lower) {
            (_, ' ') => accent,
            ('\'', 'a') => 'á',
            ('\'', 'e') => 'é',
            ('\'', 'i') => 'í',
            ('\'', 'o') => 'ó',
            ('\'', 'u') => 'ú',
            ('\'', 'y') => 'ý',
            ('\'', 'c') => 'ç',
            ('`', 'a') => 'à',
            ('`', 'e') => 'è',
            ('`', 'i') => 'ì',
            ('`', 'o') => 'ò',
            ('`', 'u') => 'ù',
            ('^', 'a') => 'â',
            ('^', 'e') => 'ê',
            ('^', 'i') => 'î',
            ('^', 'o') => 'ô',
            ('^', 'u') => 'û',
            ('~', 'a') => 'ã',
            ('~', 'n') => 'ñ',
            ('~', 'o') => 'õ',
            ('"', 'a') => 'ä',
            ('"', 'e') => 'ë',
            ('"', 'i') => 'ï',
            ('"', 'o') => 'ö',
            ('"', 'u') => 'ü',
            ('"', 'y') => 'ÿ',
            _ => return None,
        };
        if c.is_ascii_uppercase() {
            composed.to_uppercase().next()
        } else {
            Some(composed)
        }
    }
}

impl KeyTranslator for TableTranslator {
    fn translate(&self, key: KeyInput, dead: Option<&DeadKey>) -> Translation {
        if !Self::supports(key.layout) {
            return Translation::None;
        }
        if let Some(c) = Self::control_char(key.vk, key.mods) {
            return Translation::One(c);
        }
        // Ctrl or Alt with anything else types nothing on these layouts
        if key.mods.intersects(Modifiers::CTRL | Modifiers::ALT) {
            return Translation::None;
        }

        let shift = key.mods.contains(Modifiers::SHIFT);
        let intl = key.layout == LayoutId::US_INTERNATIONAL;
        let pending = dead.and_then(|d| Self::dead_accent(d.vk, d.mods.contains(Modifiers::SHIFT)));

        if intl && pending.is_none() && Self::dead_accent(key.vk, shift).is_some() {
            return Translation::Dead;
        }
        let Some(c) = Self::base_char(key.vk, shift, key.caps_lock) else {
            return Translation::None;
        };
        match pending {
            None => Translation::One(c),
            Some(accent) => match Self::compose(accent, c) {
                Some(composed) => Translation::One(composed),
                None => Translation::Two(accent, c),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(vk: Key, mods: Modifiers, layout: LayoutId) -> KeyInput {
        KeyInput {
            vk,
            scan: 0,
            mods,
            caps_lock: false,
            layout,
        }
    }

    fn us(vk: Key, mods: Modifiers) -> Translation {
        TableTranslator.translate(input(vk, mods, LayoutId::US), None)
    }

    #[test]
    fn test_us_layout() {
        let none = Modifiers::empty();
        assert_eq!(us(Key(b'A'), none), Translation::One('a'));
        assert_eq!(us(Key(b'A'), Modifiers::SHIFT), Translation::One('A'));
        assert_eq!(us(Key(b'3'), Modifiers::SHIFT), Translation::One('#'));
        assert_eq!(us(Key::OEM_7, none), Translation::One('\''));
        assert_eq!(us(Key::SPACE, none), Translation::One(' '));
        assert_eq!(us(Key::ENTER, none), Translation::One('\r'));
        assert_eq!(us(Key::ENTER, Modifiers::CTRL), Translation::One('\n'));
        assert_eq!(us(Key(b'C'), Modifiers::CTRL), Translation::One('\x03'));
        assert_eq!(us(Key::F1, none), Translation::None);
        assert_eq!(us(Key(b'1'), Modifiers::CTRL), Translation::None);
    }

    #[test]
    fn test_caps_lock_affects_letters_only() {
        let mut k = input(Key(b'Q'), Modifiers::empty(), LayoutId::US);
        k.caps_lock = true;
        assert_eq!(TableTranslator.translate(k, None), Translation::One('Q'));
        k.mods = Modifiers::SHIFT;
        assert_eq!(TableTranslator.translate(k, None), Translation::One('q'));
        k.vk = Key(b'1');
        assert_eq!(TableTranslator.translate(k, None), Translation::One('!'));
    }

    #[test]
    fn test_unknown_layout() {
        let k = input(Key(b'A'), Modifiers::empty(), LayoutId(0x0407));
        assert_eq!(TableTranslator.translate(k, None), Translation::None);
    }

    #[test]
    fn test_dead_key_round_trip() {
        let mut r = KeyResolver::new(Box::new(TableTranslator));
        let intl = LayoutId::US_INTERNATIONAL;

        assert_eq!(r.resolve(input(Key::OEM_7, Modifiers::empty(), intl)), Translation::Dead);
        assert!(r.pending().is_some());
        assert_eq!(r.resolve(input(Key(b'E'), Modifiers::empty(), intl)), Translation::One('é'));
        assert!(r.pending().is_none());

        // Shift+6 is a dead circumflex; Shift+A makes it uppercase
        assert_eq!(r.resolve(input(Key(b'6'), Modifiers::SHIFT, intl)), Translation::Dead);
        assert_eq!(r.resolve(input(Key(b'A'), Modifiers::SHIFT, intl)), Translation::One('Â'));

        // no composition: accent then the character
        r.resolve(input(Key::OEM_3, Modifiers::empty(), intl));
        assert_eq!(r.resolve(input(Key(b'X'), Modifiers::empty(), intl)), Translation::Two('`', 'x'));

        // dead key followed by space types the accent
        r.resolve(input(Key::OEM_3, Modifiers::SHIFT, intl));
        assert_eq!(r.resolve(input(Key::SPACE, Modifiers::empty(), intl)), Translation::One('~'));
    }

    #[test]
    fn test_dead_key_dropped_on_layout_change() {
        let mut r = KeyResolver::new(Box::new(TableTranslator));
        r.resolve(input(Key::OEM_7, Modifiers::empty(), LayoutId::US_INTERNATIONAL));
        let t = r.resolve(input(Key(b'E'), Modifiers::empty(), LayoutId::US));
        assert_eq!(t, Translation::One('e'));
        assert!(r.pending().is_none());
    }

    #[test]
    fn test_translation_chars() {
        assert_eq!(Translation::Two('a', 'b').chars().collect::<String>(), "ab");
        assert_eq!(Translation::Dead.chars().count(), 0);
    }
}
