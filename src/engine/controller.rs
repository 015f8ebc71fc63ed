//! Trigger registration and the Stopped/Running engine lifecycle
//!
//! Triggers are registered while the engine is stopped. [`ActionTriggers::start`]
//! freezes both registries into a snapshot and returns the [`TriggerEngine`]
//! that the hook thread owns; any further registration fails until
//! [`ActionTriggers::stop`].

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::hook::{ResetFlag, Snapshot, TriggerEngine};
use crate::autotext::{
    AutotextDefaults, AutotextFlags, AutotextMatcher, AutotextTrigger, KeyTranslator, PostfixKey,
    PostfixType,
};
use crate::context::LayoutId;
use crate::dispatch::Dispatch;
use crate::error::{Result, TriggerError};
use crate::events::TriggerEvent;
use crate::hotkey::{HotkeyFlags, HotkeyTrigger};
use crate::keys::{parse_hotkey, Key};
use crate::registry::{Action, Registry, Scope, Source, TriggerDef, TriggerId, TriggerInfo, TriggerKind};

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Running => write!(f, "Running"),
        }
    }
}

/// Per-trigger autotext options; unset fields take the current defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutotextOptions {
    #[serde(default)]
    pub flags: Option<AutotextFlags>,
    #[serde(default)]
    pub postfix_type: Option<PostfixType>,
    /// Delimiters accepted as postfix; `None` accepts any non-word char
    #[serde(default)]
    pub postfix_chars: Option<String>,
}

/// Registration API and engine controller
pub struct ActionTriggers {
    state: EngineState,
    /// Time when the engine was started
    started_at: Option<Instant>,
    hotkeys: Registry,
    autotexts: Registry,
    next_id: u32,
    /// Scope given to triggers added afterwards
    scope: Option<Arc<dyn Scope>>,
    defaults: AutotextDefaults,
    postfix_key: PostfixKey,
    word_chars: String,
    default_layout: LayoutId,
    disabled: Arc<AtomicBool>,
    reset: ResetFlag,
    event_tx: broadcast::Sender<TriggerEvent>,
}

impl ActionTriggers {
    pub fn new(event_tx: broadcast::Sender<TriggerEvent>) -> Self {
        Self {
            state: EngineState::Stopped,
            started_at: None,
            hotkeys: Registry::new(),
            autotexts: Registry::new(),
            next_id: 1,
            scope: None,
            defaults: AutotextDefaults::default(),
            postfix_key: PostfixKey::default(),
            word_chars: String::new(),
            default_layout: LayoutId::US,
            disabled: Arc::new(AtomicBool::new(false)),
            reset: ResetFlag::new(),
            event_tx,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    fn ensure_stopped(&self) -> Result<()> {
        match self.state {
            EngineState::Stopped => Ok(()),
            EngineState::Running => Err(TriggerError::Running),
        }
    }

    /// Sets the scope of triggers added after this call
    pub fn set_scope(&mut self, scope: Option<Arc<dyn Scope>>) {
        self.scope = scope;
    }

    /// Autotext defaults applied to triggers added afterwards
    pub fn defaults(&self) -> &AutotextDefaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut AutotextDefaults {
        &mut self.defaults
    }

    /// Restores the autotext defaults; the scope is cleared with
    /// `set_scope(None)`
    pub fn reset_options(&mut self) {
        self.defaults = AutotextDefaults::default();
    }

    pub fn set_postfix_key(&mut self, key: PostfixKey) -> Result<()> {
        self.ensure_stopped()?;
        self.postfix_key = key;
        Ok(())
    }

    /// Extra characters treated as part of words, like `"_#"`
    pub fn set_word_chars(&mut self, chars: &str) -> Result<()> {
        self.ensure_stopped()?;
        self.word_chars = chars.to_string();
        Ok(())
    }

    pub fn set_default_layout(&mut self, layout: LayoutId) -> Result<()> {
        self.ensure_stopped()?;
        self.default_layout = layout;
        Ok(())
    }

    /// Adds a hotkey like `"Ctrl+Shift+K"`. Without an action the key is
    /// only blocked.
    #[track_caller]
    pub fn add_hotkey(
        &mut self,
        hotkey: &str,
        flags: HotkeyFlags,
        action: Option<Action>,
    ) -> Result<TriggerId> {
        let source = Source::from(Location::caller());
        self.ensure_stopped()?;

        let invalid = || TriggerError::InvalidHotkey(hotkey.to_string());
        let parsed = parse_hotkey(hotkey, false).ok_or_else(invalid)?;
        let key = parsed.key.ok_or_else(invalid)?;
        let trigger = HotkeyTrigger::new(key, parsed.mods, parsed.any, flags, hotkey)?;
        Ok(self.register(TriggerKind::Hotkey(trigger), u32::from(key.0), action, source))
    }

    /// Adds a hotkey given as a key plus a modifier string like `"Ctrl+Alt"`
    #[track_caller]
    pub fn add_hotkey_key(
        &mut self,
        key: Key,
        mods: &str,
        flags: HotkeyFlags,
        action: Option<Action>,
    ) -> Result<TriggerId> {
        let source = Source::from(Location::caller());
        self.ensure_stopped()?;

        let parsed =
            parse_hotkey(mods, true).ok_or_else(|| TriggerError::InvalidModifiers(mods.to_string()))?;
        let hotkey = match mods.trim() {
            "" => key.name(),
            m => format!("{m}+{key}"),
        };
        let trigger = HotkeyTrigger::new(key, parsed.mods, parsed.any, flags, &hotkey)?;
        Ok(self.register(TriggerKind::Hotkey(trigger), u32::from(key.0), action, source))
    }

    #[track_caller]
    pub fn add_autotext(
        &mut self,
        text: &str,
        options: &AutotextOptions,
        action: Action,
    ) -> Result<TriggerId> {
        let source = Source::from(Location::caller());
        self.ensure_stopped()?;

        let trigger = self.autotext_trigger(text, options)?;
        let key = trigger.bucket_key();
        Ok(self.register(TriggerKind::Autotext(trigger), key, Some(action), source))
    }

    /// Adds autotext that replaces the typed text with `replacement`.
    ///
    /// The fired event carries the [`ReplacePlan`](crate::autotext::ReplacePlan)
    /// for whoever sends the keys.
    #[track_caller]
    pub fn simple_replace(
        &mut self,
        text: &str,
        replacement: &str,
        options: &AutotextOptions,
    ) -> Result<TriggerId> {
        let source = Source::from(Location::caller());
        self.ensure_stopped()?;

        let trigger = self.autotext_trigger(text, options)?.with_replacement(replacement);
        let key = trigger.bucket_key();
        let action: Action = Arc::new(|_| Ok(()));
        Ok(self.register(TriggerKind::Autotext(trigger), key, Some(action), source))
    }

    fn autotext_trigger(&self, text: &str, options: &AutotextOptions) -> Result<AutotextTrigger> {
        let postfix_chars = match &options.postfix_chars {
            Some(chars) => Some(chars.as_str()),
            None => self.defaults.postfix_chars(),
        };
        AutotextTrigger::new(
            text,
            options.flags.unwrap_or(self.defaults.flags),
            options.postfix_type.unwrap_or(self.defaults.postfix_type),
            postfix_chars,
        )
    }

    fn register(
        &mut self,
        kind: TriggerKind,
        key: u32,
        action: Option<Action>,
        source: Source,
    ) -> TriggerId {
        let id = TriggerId(self.next_id);
        self.next_id += 1;

        let def = Arc::new(TriggerDef::new(id, source, kind, action, self.scope.clone()));
        debug!(%id, trigger = %def, source = %def.source, "trigger registered");
        let registry = match def.kind {
            TriggerKind::Hotkey(_) => &mut self.hotkeys,
            TriggerKind::Autotext(_) => &mut self.autotexts,
        };
        registry.add(key, def);
        id
    }

    pub fn remove(&mut self, id: TriggerId) -> Result<()> {
        self.ensure_stopped()?;
        if self.hotkeys.remove(id) || self.autotexts.remove(id) {
            debug!(%id, "trigger removed");
            Ok(())
        } else {
            Err(TriggerError::UnknownTrigger(id))
        }
    }

    /// Runtime switch for one trigger; allowed while running
    pub fn set_disabled(&self, id: TriggerId, disabled: bool) -> Result<()> {
        let def = self
            .hotkeys
            .get(id)
            .or_else(|| self.autotexts.get(id))
            .ok_or(TriggerError::UnknownTrigger(id))?;
        def.set_disabled(disabled);
        info!(%id, trigger = %def, disabled, "trigger switched");
        Ok(())
    }

    /// Runtime switch for all triggers; allowed while running
    pub fn set_disabled_all(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Relaxed);
        info!(disabled, "all triggers switched");
    }

    pub fn is_disabled_all(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// All registered triggers, by id
    pub fn list(&self) -> Vec<TriggerInfo> {
        let mut list: Vec<TriggerInfo> = self
            .hotkeys
            .iter()
            .chain(self.autotexts.iter())
            .map(|d| d.info())
            .collect();
        list.sort_by_key(|t| t.id);
        list
    }

    pub fn hotkey_count(&self) -> usize {
        self.hotkeys.len()
    }

    pub fn autotext_count(&self) -> usize {
        self.autotexts.len()
    }

    /// Handle for requesting an autotext reset from anywhere
    pub fn reset_flag(&self) -> ResetFlag {
        self.reset.clone()
    }

    /// Freezes the registries and builds the engine for the hook thread
    pub fn start(
        &mut self,
        translator: Box<dyn KeyTranslator>,
        dispatch: Arc<dyn Dispatch>,
    ) -> Result<TriggerEngine> {
        if self.is_running() {
            return Err(TriggerError::AlreadyRunning);
        }

        let snapshot = Arc::new(Snapshot {
            hotkeys: self.hotkeys.clone(),
            autotexts: self.autotexts.clone(),
        });
        let autotext = AutotextMatcher::new(translator)
            .with_postfix_key(self.postfix_key)
            .with_word_chars(&self.word_chars)
            .with_default_layout(self.default_layout);
        let engine = TriggerEngine::new(
            snapshot,
            Arc::clone(&self.disabled),
            self.reset.clone(),
            autotext,
            dispatch,
        );

        self.transition_to(EngineState::Running);
        Ok(engine)
    }

    /// Marks the engine stopped; the caller drops the engine
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(TriggerError::NotRunning);
        }
        self.transition_to(EngineState::Stopped);
        Ok(())
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: EngineState) {
        let old_state = self.state;
        let duration_ms = self
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state = new_state;
        let event = match new_state {
            EngineState::Running => {
                self.started_at = Some(Instant::now());
                TriggerEvent::EngineStarted {
                    hotkeys: self.hotkeys.len(),
                    autotexts: self.autotexts.len(),
                }
            }
            EngineState::Stopped => {
                self.started_at = None;
                TriggerEvent::EngineStopped { duration_ms }
            }
        };

        debug!(?event, "emitting engine event");
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::args::TriggerArgs;
    use crate::autotext::TableTranslator;
    use crate::context::{HookContext, KeyEvent, WindowId};
    use crate::dispatch::Fired;

    fn create_triggers() -> (ActionTriggers, broadcast::Receiver<TriggerEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (ActionTriggers::new(tx), rx)
    }

    fn noop() -> Action {
        Arc::new(|_| Ok(()))
    }

    fn start(t: &mut ActionTriggers) -> (TriggerEngine, Arc<Mutex<Vec<Fired>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let dispatch: Arc<dyn Dispatch> = Arc::new(move |f: Fired| sink.lock().unwrap().push(f));
        let engine = t.start(Box::new(TableTranslator), dispatch).unwrap();
        (engine, fired)
    }

    #[test]
    fn test_initial_state() {
        let (t, _) = create_triggers();
        assert_eq!(t.state(), EngineState::Stopped);
        assert!(t.list().is_empty());
    }

    #[test]
    fn test_registration_rejected_while_running() {
        let (mut t, _) = create_triggers();
        let id = t.add_hotkey("Ctrl+K", HotkeyFlags::empty(), Some(noop())).unwrap();
        let _engine = start(&mut t);

        assert!(matches!(
            t.add_hotkey("Ctrl+J", HotkeyFlags::empty(), None),
            Err(TriggerError::Running)
        ));
        assert!(matches!(
            t.add_autotext("btw", &AutotextOptions::default(), noop()),
            Err(TriggerError::Running)
        ));
        assert!(matches!(t.remove(id), Err(TriggerError::Running)));
        assert!(matches!(t.set_word_chars("_"), Err(TriggerError::Running)));
        assert_eq!(t.hotkey_count(), 1);

        t.stop().unwrap();
        assert!(t.add_hotkey("Ctrl+J", HotkeyFlags::empty(), None).is_ok());
        t.remove(id).unwrap();
        assert_eq!(t.hotkey_count(), 1);
    }

    #[test]
    fn test_invalid_registrations() {
        let (mut t, _) = create_triggers();
        assert!(matches!(
            t.add_hotkey("Ctrl+Nope", HotkeyFlags::empty(), None),
            Err(TriggerError::InvalidHotkey(_))
        ));
        assert!(matches!(
            t.add_hotkey("Ctrl+Shift", HotkeyFlags::empty(), None),
            Err(TriggerError::InvalidHotkey(_))
        ));
        assert!(matches!(
            t.add_hotkey_key(Key(b'K'), "Ctrl+K", HotkeyFlags::empty(), None),
            Err(TriggerError::InvalidModifiers(_))
        ));
        assert!(matches!(
            t.add_hotkey("F1", HotkeyFlags::LEFT_MOD, None),
            Err(TriggerError::InvalidFlags(_))
        ));
        assert!(matches!(
            t.add_autotext("", &AutotextOptions::default(), noop()),
            Err(TriggerError::TextLength(0))
        ));
        let opts = AutotextOptions {
            postfix_chars: Some(",a".into()),
            ..Default::default()
        };
        assert!(matches!(
            t.add_autotext("btw", &opts, noop()),
            Err(TriggerError::PostfixChars(_))
        ));
        assert!(matches!(t.remove(TriggerId(42)), Err(TriggerError::UnknownTrigger(_))));
        assert!(t.list().is_empty());
    }

    #[test]
    fn test_listing_and_source() {
        let (mut t, _) = create_triggers();
        let a = t
            .add_hotkey_key(Key(b'K'), "Ctrl+Shift", HotkeyFlags::KEY_MOD_UP, Some(noop()))
            .unwrap();
        let b = t.simple_replace("#addr", "1 Main St", &AutotextOptions::default()).unwrap();

        let list = t.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, a);
        assert_eq!(list[0].params, "Ctrl+Shift+K (KEY_MOD_UP)");
        assert!(list[0].source.file.ends_with("controller.rs"));
        assert_eq!(list[1].id, b);
        assert_eq!(list[1].kind, "Autotext");
        assert!(list[1].has_action);
    }

    #[test]
    fn test_defaults_apply_to_later_triggers() {
        let (mut t, _) = create_triggers();
        t.defaults_mut().flags = AutotextFlags::MATCH_CASE;
        t.defaults_mut().postfix_type = PostfixType::None;
        t.defaults_mut().set_postfix_chars(Some(",.")).unwrap();
        let a = t.add_autotext("Btw", &AutotextOptions::default(), noop()).unwrap();

        let opts = AutotextOptions {
            flags: Some(AutotextFlags::CONFIRM),
            ..Default::default()
        };
        let b = t.add_autotext("brb", &opts, noop()).unwrap();

        t.reset_options();
        let c = t.add_autotext("omw", &AutotextOptions::default(), noop()).unwrap();

        let autotext = |id| match &t.autotexts.get(id).unwrap().kind {
            TriggerKind::Autotext(x) => x.clone(),
            TriggerKind::Hotkey(_) => unreachable!(),
        };
        let a = autotext(a);
        assert_eq!(a.text(), "Btw");
        assert_eq!(a.postfix_type(), PostfixType::None);
        assert_eq!(a.postfix_chars(), Some(",."));
        let b = autotext(b);
        assert_eq!(b.flags(), AutotextFlags::CONFIRM);
        assert_eq!(b.postfix_type(), PostfixType::None);
        let c = autotext(c);
        assert_eq!(c.flags(), AutotextFlags::empty());
        assert_eq!(c.postfix_type(), PostfixType::CharOrKey);
        assert_eq!(c.postfix_chars(), None);
    }

    #[test]
    fn test_start_stop_events() {
        let (mut t, mut rx) = create_triggers();
        t.add_hotkey("Ctrl+K", HotkeyFlags::empty(), None).unwrap();
        let _engine = start(&mut t);
        assert!(t.is_running());
        assert!(matches!(
            t.start(Box::new(TableTranslator), Arc::new(|_: Fired| {})),
            Err(TriggerError::AlreadyRunning)
        ));
        t.stop().unwrap();
        assert!(matches!(t.stop(), Err(TriggerError::NotRunning)));

        assert_eq!(
            rx.try_recv().unwrap(),
            TriggerEvent::EngineStarted { hotkeys: 1, autotexts: 0 }
        );
        assert!(matches!(rx.try_recv().unwrap(), TriggerEvent::EngineStopped { .. }));
    }

    #[test]
    fn test_runtime_switches_reach_running_engine() {
        let (mut t, _) = create_triggers();
        let id = t.add_hotkey("Ctrl+K", HotkeyFlags::empty(), Some(noop())).unwrap();
        let (mut engine, fired) = start(&mut t);
        let w = WindowId(1);

        let chord = |engine: &mut TriggerEngine| {
            engine.hook(&KeyEvent::down(Key::LCTRL).in_window(w));
            let d = engine.hook(&KeyEvent::down(Key(b'K')).in_window(w));
            engine.hook(&KeyEvent::up(Key(b'K')).in_window(w));
            engine.hook(&KeyEvent::up(Key::LCTRL).in_window(w));
            d
        };

        assert!(chord(&mut engine).eat);
        t.set_disabled(id, true).unwrap();
        assert!(!chord(&mut engine).eat);
        t.set_disabled(id, false).unwrap();
        t.set_disabled_all(true);
        assert!(!chord(&mut engine).eat);
        t.set_disabled_all(false);
        assert!(chord(&mut engine).eat);
        assert_eq!(fired.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_scope_applies_to_later_triggers() {
        let (mut t, _) = create_triggers();
        let scope: Arc<dyn Scope> = Arc::new(|args: &TriggerArgs, _: &HookContext| {
            args.window() == Some(WindowId(2))
        });
        t.set_scope(Some(scope));
        t.add_hotkey("Ctrl+K", HotkeyFlags::empty(), Some(noop())).unwrap();
        t.set_scope(None);
        t.add_hotkey("Ctrl+J", HotkeyFlags::empty(), Some(noop())).unwrap();
        let (mut engine, _) = start(&mut t);

        engine.hook(&KeyEvent::down(Key::LCTRL).in_window(WindowId(1)));
        assert!(!engine.hook(&KeyEvent::down(Key(b'K')).in_window(WindowId(1))).eat);
        assert!(engine.hook(&KeyEvent::down(Key(b'J')).in_window(WindowId(1))).eat);
    }

    #[test]
    fn test_reset_options_keeps_scope() {
        let (mut t, _) = create_triggers();
        let scope: Arc<dyn Scope> = Arc::new(|_: &TriggerArgs, _: &HookContext| false);
        t.set_scope(Some(scope));
        t.defaults_mut().flags = AutotextFlags::MATCH_CASE;
        t.reset_options();
        assert_eq!(t.defaults().flags, AutotextFlags::empty());

        let k = t.add_hotkey("Ctrl+K", HotkeyFlags::empty(), Some(noop())).unwrap();
        let a = t.add_autotext("btw", &AutotextOptions::default(), noop()).unwrap();
        assert!(t.hotkeys.get(k).unwrap().scope.is_some());
        assert!(t.autotexts.get(a).unwrap().scope.is_some());

        t.set_scope(None);
        let j = t.add_hotkey("Ctrl+J", HotkeyFlags::empty(), Some(noop())).unwrap();
        assert!(t.hotkeys.get(j).unwrap().scope.is_none());
    }
}
