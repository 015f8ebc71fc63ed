//! Autotext triggers
//!
//! Recognizes typed character sequences. Key events are converted to
//! characters with the focused window's keyboard layout, kept in a bounded
//! buffer and matched against the registered texts after every character.

mod buffer;
mod matcher;
mod replace;
mod resolve;
mod trigger;

pub use buffer::{TypedBuffer, TypedChar, CAPACITY};
pub use matcher::AutotextMatcher;
pub use replace::{EraseMethod, ReplacePlan, CARET_MARKER};
pub use resolve::{DeadKey, KeyInput, KeyResolver, KeyTranslator, TableTranslator, Translation};
pub use trigger::{
    bucket_key, AutotextDefaults, AutotextFlags, AutotextTrigger, PostfixKey, PostfixType,
    MAX_TEXT_LEN,
};
