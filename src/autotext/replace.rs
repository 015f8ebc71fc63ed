//! Replacement planning for autotext actions
//!
//! The plan is a declarative description of the keys to send; whoever
//! runs the action executes it.

use serde::{Deserialize, Serialize};

use crate::args::AutotextArgs;
use crate::keys::Key;

use super::trigger::AutotextFlags;

/// Marks the caret position in replacement text
pub const CARET_MARKER: &str = "[[|]]";

/// How the typed text is removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseMethod {
    #[default]
    Backspace,
    /// Select with `Shift+Left` so the new text replaces the selection
    ShiftLeft,
}

/// Keys and text that replace the user-typed text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePlan {
    /// Ask the user before replacing
    pub confirm: bool,
    /// Characters to erase or select
    pub erase: usize,
    pub erase_with: EraseMethod,
    /// Text to type
    pub text: String,
    /// Postfix typed as a key after the text (`Space`, `Enter` or `Tab`)
    pub postfix_key: Option<Key>,
    /// `Left` presses after everything is typed
    pub caret_left: usize,
}

impl AutotextArgs {
    /// Plans replacing the typed text with `replacement`.
    ///
    /// `replacement` may contain [`CARET_MARKER`] once.
    pub fn replace_plan(&self, replacement: &str) -> ReplacePlan {
        let (mut text, after_caret) = match replacement.find(CARET_MARKER) {
            Some(i) => {
                let after = &replacement[i + CARET_MARKER.len()..];
                (format!("{}{after}", &replacement[..i]), Some(count_typed(after)))
            }
            None => (replacement.to_string(), None),
        };

        if !self.flags.intersects(AutotextFlags::REPLACE_RAW | AutotextFlags::MATCH_CASE) {
            text = self.adapt_case(text);
        }

        let typed = self.text.chars().count();
        let erase = if self.flags.contains(AutotextFlags::DONT_ERASE) {
            usize::from(self.has_postfix_char)
        } else {
            typed
        };
        let erase_with = if self.shift_left {
            EraseMethod::ShiftLeft
        } else {
            EraseMethod::Backspace
        };

        let mut postfix_key = None;
        let mut postfix_len = 0;
        if let Some(c) = self.postfix_char() {
            if !self.flags.contains(AutotextFlags::REMOVE_POSTFIX) {
                postfix_len = 1;
                match c {
                    // typed as keys: pasted text may lose them
                    ' ' => postfix_key = Some(Key::SPACE),
                    '\r' => postfix_key = Some(Key::ENTER),
                    '\t' => postfix_key = Some(Key::TAB),
                    c => text.push(c),
                }
            }
        }

        ReplacePlan {
            confirm: self.flags.contains(AutotextFlags::CONFIRM),
            erase,
            erase_with,
            text,
            postfix_key,
            caret_left: after_caret.map_or(0, |n| n + postfix_len),
        }
    }

    /// Uppercases the first character of `r` when the typed text starts
    /// with an uppercase letter, or all of it when the typed text has no
    /// lowercase letters and at least two uppercase ones
    fn adapt_case(&self, r: String) -> String {
        let typed: Vec<char> = self.text.chars().collect();
        let len = typed.len().saturating_sub(usize::from(self.has_postfix_char));
        let typed = &typed[..len];

        // skip leading symbols like the '#' in "#abc"
        let Some(first) = typed.iter().position(|c| c.is_alphanumeric()) else {
            return r;
        };
        if !typed[first].is_uppercase() {
            return r;
        }
        let mut all_upper = false;
        for c in &typed[first + 1..] {
            if c.is_lowercase() {
                all_upper = false;
                break;
            }
            if c.is_uppercase() {
                all_upper = true;
            }
        }

        if all_upper {
            r.to_uppercase()
        } else {
            let mut chars = r.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => r,
            }
        }
    }
}

/// `Left` presses needed to move over `s`; a line break is one
fn count_typed(s: &str) -> usize {
    s.replace("\r\n", "\r").chars().count()
}
