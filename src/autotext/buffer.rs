//! Ring of recently typed characters

use std::collections::VecDeque;
use std::ops::Index;

use super::trigger::fold_char;

/// Most characters kept. Longer than any trigger text so a match can also
/// check the character before it.
pub const CAPACITY: usize = 128;

/// Characters dropped when the buffer is full of a single word
const WORD_EVICT: usize = CAPACITY - 20;

/// A typed character with its lowercase form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedChar {
    pub c: char,
    pub low: char,
    pub is_word: bool,
}

impl TypedChar {
    pub fn new(c: char, is_word: bool) -> Self {
        Self {
            c,
            low: fold_char(c),
            is_word,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypedBuffer {
    chars: VecDeque<TypedChar>,
}

impl TypedBuffer {
    pub fn new() -> Self {
        Self {
            chars: VecDeque::with_capacity(CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn clear(&mut self) {
        self.chars.clear();
    }

    /// Backspace
    pub fn pop(&mut self) {
        self.chars.pop_back();
    }

    /// Appends a character, first evicting the oldest word and its
    /// delimiter when full.
    ///
    /// A full buffer without any delimiter is cleared instead when the new
    /// character is a delimiter too; returns `false` then.
    pub fn push(&mut self, tc: TypedChar) -> bool {
        if self.chars.len() >= CAPACITY {
            let evict = match self.chars.iter().position(|c| !c.is_word) {
                Some(i) => i + 1,
                None if !tc.is_word => {
                    self.chars.clear();
                    return false;
                }
                None => WORD_EVICT,
            };
            self.chars.drain(..evict);
        }
        self.chars.push_back(tc);
        true
    }

    /// Original characters in `range`
    pub fn text(&self, range: std::ops::Range<usize>) -> String {
        self.chars.range(range).map(|c| c.c).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypedChar> {
        self.chars.iter()
    }
}

impl Default for TypedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for TypedBuffer {
    type Output = TypedChar;

    fn index(&self, i: usize) -> &TypedChar {
        &self.chars[i]
    }
}
