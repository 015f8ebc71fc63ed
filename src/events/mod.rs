//! Events module for engine lifecycle and fired triggers
//!
//! Events are broadcast to IPC subscribers.

use serde::{Deserialize, Serialize};

use crate::args::TriggerArgs;
use crate::autotext::ReplacePlan;
use crate::context::MuteMods;
use crate::registry::TriggerId;

/// Events emitted by the controller and the action runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// The engine started with this many definitions
    EngineStarted { hotkeys: usize, autotexts: usize },

    /// The engine stopped
    EngineStopped {
        /// How long the engine was running, in milliseconds
        duration_ms: u64,
    },

    /// A trigger matched and was handed to the action runner
    TriggerFired {
        id: TriggerId,
        /// Like `Hotkey Ctrl+K`
        trigger: String,
        args: TriggerArgs,
        mute: MuteMods,
        /// Keys to send for simple-replace triggers
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replace: Option<ReplacePlan>,
    },

    /// A trigger action returned an error or panicked
    ActionFailed {
        id: TriggerId,
        trigger: String,
        error: String,
    },
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerEvent::EngineStarted { hotkeys, autotexts } => {
                write!(f, "ENGINE_STARTED ({hotkeys} hotkeys, {autotexts} autotexts)")
            }
            TriggerEvent::EngineStopped { duration_ms } => {
                write!(f, "ENGINE_STOPPED ({}ms)", duration_ms)
            }
            TriggerEvent::TriggerFired { id, trigger, .. } => {
                write!(f, "TRIGGER_FIRED {id} {trigger}")
            }
            TriggerEvent::ActionFailed { id, trigger, error } => {
                write!(f, "ACTION_FAILED {id} {trigger}: {error}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::HotkeyArgs;
    use crate::keys::{Key, Modifiers};

    #[test]
    fn test_event_serialization() {
        let event = TriggerEvent::EngineStopped { duration_ms: 1500 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("engine_stopped"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_fired_event_serialization() {
        let event = TriggerEvent::TriggerFired {
            id: TriggerId(4),
            trigger: "Hotkey Ctrl+K".into(),
            args: TriggerArgs::Hotkey(HotkeyArgs {
                trigger: TriggerId(4),
                window: None,
                key: Key(b'K'),
                mods: Modifiers::CTRL,
            }),
            mute: MuteMods::Release,
            replace: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"trigger_fired""#));
        assert!(json.contains(r#""kind":"hotkey""#));
        assert!(!json.contains("replace"));
        let back: TriggerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(event.to_string(), "TRIGGER_FIRED #4 Hotkey Ctrl+K");
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"engine_started","hotkeys":2,"autotexts":0}"#;
        let event: TriggerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, TriggerEvent::EngineStarted { hotkeys: 2, .. }));
    }
}
