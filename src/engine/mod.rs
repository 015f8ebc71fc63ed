//! Engine module: the hook pass, its controller and the hook thread

mod controller;
mod hook;
mod thread;

pub use controller::{ActionTriggers, AutotextOptions, EngineState};
pub use hook::{HookDecision, ResetFlag, Snapshot, TriggerEngine};
pub use thread::{HookError, HookThread};
