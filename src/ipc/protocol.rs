//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use trigger_daemon::autotext::{AutotextFlags, PostfixType};
use trigger_daemon::context::KeyEvent;
use trigger_daemon::engine::{EngineState, HookDecision};
use trigger_daemon::error::TriggerError;
use trigger_daemon::events::TriggerEvent;
use trigger_daemon::hotkey::HotkeyFlags;
use trigger_daemon::registry::{TriggerId, TriggerInfo};

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from clients and the hook shim to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Subscribe to trigger notifications
    Subscribe,

    /// Register a hotkey like `"Ctrl+Shift+K"`
    RegisterHotkey {
        hotkey: String,
        /// Flag names like `"KeyModUp"`
        #[serde(default)]
        flags: Vec<String>,
        /// Only block the key; nothing fires
        #[serde(default)]
        block_only: bool,
    },

    /// Register autotext, optionally replaced with `replacement`
    RegisterAutotext {
        text: String,
        #[serde(default)]
        replacement: Option<String>,
        /// Flag names like `"MatchCase"`; defaults when absent
        #[serde(default)]
        flags: Option<Vec<String>>,
        #[serde(default)]
        postfix_type: Option<PostfixType>,
        #[serde(default)]
        postfix_chars: Option<String>,
    },

    /// Remove a trigger (engine stopped only)
    Unregister { id: TriggerId },

    /// List registered triggers
    ListTriggers,

    /// Switch one trigger, or all when `id` is absent
    SetDisabled {
        #[serde(default)]
        id: Option<TriggerId>,
        disabled: bool,
    },

    /// Start the engine
    Start,

    /// Stop the engine
    Stop,

    /// A raw key event from the hook shim
    KeyEvent { event: KeyEvent },

    /// Reset typed autotext text everywhere
    ResetAutotext,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// A trigger was registered
    Registered { id: TriggerId },

    /// Registered triggers
    Triggers { triggers: Vec<TriggerInfo> },

    /// What to do with a key event
    Decision(HookDecision),

    /// The request succeeded
    Ok,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<TriggerError> for Response {
    fn from(e: TriggerError) -> Self {
        let code = match &e {
            TriggerError::InvalidHotkey(_) => "invalid_hotkey",
            TriggerError::InvalidModifiers(_) => "invalid_modifiers",
            TriggerError::InvalidFlags(_) => "invalid_flags",
            TriggerError::TextLength(_) => "text_length",
            TriggerError::PostfixChars(_) => "postfix_chars",
            TriggerError::PostfixKey => "postfix_key",
            TriggerError::Running => "running",
            TriggerError::AlreadyRunning => "already_running",
            TriggerError::NotRunning => "not_running",
            TriggerError::UnknownTrigger(_) => "unknown_trigger",
        };
        Response::error(code, e.to_string())
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Engine lifecycle or trigger event occurred
    Event { event: TriggerEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Engine lifecycle state
    pub engine: EngineState,

    pub hotkeys: usize,

    pub autotexts: usize,

    /// All triggers switched off
    pub disabled: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            engine: EngineState::default(),
            hotkeys: 0,
            autotexts: 0,
            disabled: false,
            uptime_secs: 0,
        }
    }
}

/// Parses flag names; returns the first unknown name on failure
pub fn hotkey_flags(names: &[String]) -> Result<HotkeyFlags, String> {
    names.iter().try_fold(HotkeyFlags::empty(), |flags, name| {
        HotkeyFlags::parse_name(name)
            .map(|f| flags | f)
            .ok_or_else(|| name.clone())
    })
}

/// Parses flag names; returns the first unknown name on failure
pub fn autotext_flags(names: &[String]) -> Result<AutotextFlags, String> {
    names.iter().try_fold(AutotextFlags::empty(), |flags, name| {
        AutotextFlags::parse_name(name)
            .map(|f| flags | f)
            .ok_or_else(|| name.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use trigger_daemon::keys::Key;

    #[test]
    fn test_request_serialization() {
        let req = Request::RegisterHotkey {
            hotkey: "Ctrl+K".into(),
            flags: vec!["KeyModUp".into()],
            block_only: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("register_hotkey"));
        assert!(json.contains("KeyModUp"));
    }

    #[test]
    fn test_request_defaults() {
        let req: Request = serde_json::from_str(r#"{"type":"register_autotext","text":"btw"}"#).unwrap();
        match req {
            Request::RegisterAutotext {
                text,
                replacement,
                flags,
                postfix_type,
                postfix_chars,
            } => {
                assert_eq!(text, "btw");
                assert!(replacement.is_none() && flags.is_none());
                assert!(postfix_type.is_none() && postfix_chars.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }

        let req: Request =
            serde_json::from_str(r#"{"type":"key_event","event":{"vk":75,"window":1}}"#).unwrap();
        assert!(matches!(req, Request::KeyEvent { event } if event.vk == Key(b'K') && !event.up));

        let req: Request = serde_json::from_str(r#"{"type":"set_disabled","disabled":true}"#).unwrap();
        assert!(matches!(req, Request::SetDisabled { id: None, disabled: true }));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains(r#""engine":"stopped""#));

        let resp = Response::Decision(HookDecision {
            eat: true,
            menu_guard: false,
            fired: Some(TriggerId(3)),
        });
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"decision","eat":true,"menu_guard":false,"fired":3}"#);
    }

    #[test]
    fn test_error_response() {
        let resp = Response::from(TriggerError::Running);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""code":"running""#));
        assert!(json.contains("stop it first"));
    }

    #[test]
    fn test_notification_serialization() {
        let n = Notification::Event {
            event: TriggerEvent::EngineStopped { duration_ms: 5 },
        };
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(
            json,
            r#"{"type":"event","event":{"type":"engine_stopped","duration_ms":5}}"#
        );
    }

    #[test]
    fn test_flag_names() {
        let names = vec!["KeyModUp".to_string(), "NoModOff".to_string()];
        assert_eq!(
            hotkey_flags(&names),
            Ok(HotkeyFlags::KEY_MOD_UP | HotkeyFlags::NO_MOD_OFF)
        );
        assert_eq!(hotkey_flags(&["Bogus".to_string()]), Err("Bogus".to_string()));
        assert_eq!(
            autotext_flags(&["MatchCase".to_string()]),
            Ok(AutotextFlags::MATCH_CASE)
        );
    }
}
