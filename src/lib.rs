//! trigger-daemon: global hotkey and autotext trigger engine
//!
//! The engine sees every raw key event before the OS delivers it and
//! decides, in bounded time, whether to swallow it and whether a trigger
//! fired:
//! - hotkeys: a key plus modifiers, optionally fired on release
//! - autotext: typed text followed by a postfix character or key
//!
//! Triggers are registered with [`engine::ActionTriggers`] while the
//! engine is stopped. Starting it yields a [`engine::TriggerEngine`] that
//! runs on one dedicated thread ([`engine::HookThread`]); matched triggers
//! leave the hook thread through [`dispatch::Dispatch`].

pub mod args;
pub mod autotext;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod keys;
pub mod registry;
