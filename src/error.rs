//! Registration and lifecycle errors

use crate::registry::TriggerId;

/// Errors returned by the trigger registration API and the engine controller
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("invalid hotkey string: {0:?}")]
    InvalidHotkey(String),

    #[error("invalid modifier string: {0:?}")]
    InvalidModifiers(String),

    #[error("invalid trigger flags: {0}")]
    InvalidFlags(&'static str),

    #[error("autotext length must be 1 - 100 characters, got {0}")]
    TextLength(usize),

    #[error("postfix characters contain letters or digits: {0:?}")]
    PostfixChars(String),

    #[error("postfix key must be Ctrl, Shift, LCtrl, RCtrl, LShift or RShift")]
    PostfixKey,

    #[error("cannot change triggers while the engine is running; stop it first")]
    Running,

    #[error("the engine is already running")]
    AlreadyRunning,

    #[error("the engine is not running")]
    NotRunning,

    #[error("no trigger with id {0}")]
    UnknownTrigger(TriggerId),
}

pub type Result<T> = std::result::Result<T, TriggerError>;
