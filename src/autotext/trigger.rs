//! Autotext trigger definitions and registration options

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TriggerError};
use crate::keys::{Key, Modifiers};

/// Longest accepted trigger text, in characters
pub const MAX_TEXT_LEN: usize = 100;

bitflags::bitflags! {
    /// Flags of autotext triggers. The default (empty) set means:
    /// case-insensitive, erase the typed text with `Backspace`, adapt the
    /// replacement case to the typed text.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AutotextFlags: u8 {
        /// Case-sensitive
        const MATCH_CASE = 1;
        /// Replacement does not erase the typed text
        const DONT_ERASE = 2;
        /// Replacement text is not case-adapted
        const REPLACE_RAW = 4;
        /// Replacement drops the postfix delimiter
        const REMOVE_POSTFIX = 8;
        /// Replacement asks for confirmation first
        const CONFIRM = 16;
        /// Replacement selects the typed text with `Shift+Left` instead of
        /// erasing it
        const SHIFT_LEFT = 32;
    }
}

impl AutotextFlags {
    pub fn parse_name(name: &str) -> Option<AutotextFlags> {
        let flag = match name {
            "MatchCase" => Self::MATCH_CASE,
            "DontErase" => Self::DONT_ERASE,
            "ReplaceRaw" => Self::REPLACE_RAW,
            "RemovePostfix" => Self::REMOVE_POSTFIX,
            "Confirm" => Self::CONFIRM,
            "ShiftLeft" => Self::SHIFT_LEFT,
            _ => return None,
        };
        Some(flag)
    }
}

/// What must follow the typed text before the trigger fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostfixType {
    /// A postfix character or the postfix key
    #[default]
    CharOrKey,
    /// A postfix character: one of the trigger's postfix characters, or
    /// any non-word character when it has none
    Char,
    /// The postfix key pressed and released alone
    Key,
    /// Nothing; fires as soon as the text is typed
    None,
}

/// The modifier key that acts as postfix: `Ctrl` or `Shift`, optionally
/// restricted to one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostfixKey {
    key: Key,
    modifier: Modifiers,
}

impl PostfixKey {
    pub fn new(key: Key) -> Result<Self> {
        let modifier = key.modifier();
        if modifier != Modifiers::CTRL && modifier != Modifiers::SHIFT {
            return Err(TriggerError::PostfixKey);
        }
        Ok(Self { key, modifier })
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn modifier(&self) -> Modifiers {
        self.modifier
    }

    /// Whether the physical key `vk` counts as this postfix key
    pub fn accepts(&self, vk: Key) -> bool {
        vk.modifier() == self.modifier && (self.key.is_generic_modifier() || vk == self.key)
    }
}

impl Default for PostfixKey {
    fn default() -> Self {
        Self {
            key: Key::CTRL,
            modifier: Modifiers::CTRL,
        }
    }
}

/// Registration defaults applied to autotext triggers added afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutotextDefaults {
    pub flags: AutotextFlags,
    pub postfix_type: PostfixType,
    postfix_chars: Option<String>,
}

impl AutotextDefaults {
    pub fn postfix_chars(&self) -> Option<&str> {
        self.postfix_chars.as_deref()
    }

    pub fn set_postfix_chars(&mut self, chars: Option<&str>) -> Result<()> {
        self.postfix_chars = check_postfix_chars(chars)?;
        Ok(())
    }
}

/// Payload of an autotext definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutotextTrigger {
    text: String,
    len: usize,
    flags: AutotextFlags,
    postfix_type: PostfixType,
    postfix_chars: Option<String>,
    /// Text typed in place of the matched text by simple-replace triggers
    replacement: Option<String>,
    params: String,
}

impl AutotextTrigger {
    /// Validates and normalizes a trigger text.
    ///
    /// Line breaks become `\r` (what Enter types) and the text is
    /// lowercased unless `MATCH_CASE` is set.
    pub fn new(
        text: &str,
        flags: AutotextFlags,
        postfix_type: PostfixType,
        postfix_chars: Option<&str>,
    ) -> Result<Self> {
        let n = text.chars().count();
        if !(1..=MAX_TEXT_LEN).contains(&n) {
            return Err(TriggerError::TextLength(n));
        }
        let postfix_chars = check_postfix_chars(postfix_chars)?;

        let normalized = text.replace("\r\n", "\r").replace('\n', "\r");
        let text: String = if flags.contains(AutotextFlags::MATCH_CASE) {
            normalized
        } else {
            normalized.chars().map(fold_char).collect()
        };
        let len = text.chars().count();

        let mut params = text.escape_debug().to_string();
        if !flags.is_empty() {
            let names: Vec<&str> = flags.iter_names().map(|(name, _)| name).collect();
            params.push_str(&format!(" ({})", names.join(" | ")));
        }
        if postfix_type != PostfixType::CharOrKey {
            params.push_str(&format!(" postfix={postfix_type:?}"));
        }

        Ok(Self {
            text,
            len,
            flags,
            postfix_type,
            postfix_chars,
            replacement: None,
            params,
        })
    }

    pub(crate) fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    /// The normalized text to match
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text length in characters
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn flags(&self) -> AutotextFlags {
        self.flags
    }

    pub fn postfix_type(&self) -> PostfixType {
        self.postfix_type
    }

    pub fn postfix_chars(&self) -> Option<&str> {
        self.postfix_chars.as_deref()
    }

    pub fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref()
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    /// Registry bucket of this trigger
    pub fn bucket_key(&self) -> u32 {
        bucket_key(self.text.chars().rev().map(fold_char))
    }
}

/// Packs up to four characters, given most recent first, into a bucket
/// key: low 8 bits of each, the first one in the lowest byte.
pub fn bucket_key(recent_first: impl Iterator<Item = char>) -> u32 {
    recent_first
        .take(4)
        .enumerate()
        .fold(0, |k, (i, c)| k | ((c as u32 & 0xFF) << (8 * i)))
}

/// Per-character lowercase, keeping the character when its lowercase form
/// is not a single character
pub(crate) fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Empty means "any non-word character"
pub(crate) fn check_postfix_chars(chars: Option<&str>) -> Result<Option<String>> {
    let Some(s) = chars.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if s.chars().any(char::is_alphanumeric) {
        return Err(TriggerError::PostfixChars(s.to_string()));
    }
    if s.contains('\n') && !s.contains('\r') {
        warn!(chars = %s.escape_debug(), "postfix characters contain \\n (Ctrl+Enter) but no \\r (Enter)");
    }
    Ok(Some(s.to_string()))
}
