//! Trigger definitions and the bucketed registry the matchers search
//!
//! A registry maps an integer bucket key to the ordered list of definitions
//! sharing it. Registries are filled before the engine starts and then
//! frozen into an immutable snapshot; the hook thread reads the snapshot
//! without any locking.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::args::TriggerArgs;
use crate::autotext::AutotextTrigger;
use crate::context::HookContext;
use crate::hotkey::HotkeyTrigger;

/// Identity of a registered trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(pub u32);

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a trigger was registered, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub file: String,
    pub line: u32,
}

impl Source {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl From<&Location<'_>> for Source {
    fn from(loc: &Location<'_>) -> Self {
        Self::new(loc.file(), loc.line())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Trigger action. Runs on the action dispatcher, never on the hook thread.
pub type Action = Arc<dyn Fn(&TriggerArgs) -> anyhow::Result<()> + Send + Sync>;

/// Decides whether a structurally matched trigger is live for the current
/// window. Called on the hook thread; must be fast.
pub trait Scope: Send + Sync {
    fn accepts(&self, args: &TriggerArgs, ctx: &HookContext) -> bool;
}

impl<F> Scope for F
where
    F: Fn(&TriggerArgs, &HookContext) -> bool + Send + Sync,
{
    fn accepts(&self, args: &TriggerArgs, ctx: &HookContext) -> bool {
        self(args, ctx)
    }
}

/// Kind-specific part of a definition
#[derive(Debug)]
pub enum TriggerKind {
    Hotkey(HotkeyTrigger),
    Autotext(AutotextTrigger),
}

impl TriggerKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TriggerKind::Hotkey(_) => "Hotkey",
            TriggerKind::Autotext(_) => "Autotext",
        }
    }

    pub fn params(&self) -> &str {
        match self {
            TriggerKind::Hotkey(h) => h.params(),
            TriggerKind::Autotext(a) => a.params(),
        }
    }
}

/// A registered trigger
pub struct TriggerDef {
    pub id: TriggerId,
    pub source: Source,
    pub kind: TriggerKind,
    pub(crate) action: Option<Action>,
    pub(crate) scope: Option<Arc<dyn Scope>>,
    disabled: AtomicBool,
}

impl TriggerDef {
    pub fn new(
        id: TriggerId,
        source: Source,
        kind: TriggerKind,
        action: Option<Action>,
        scope: Option<Arc<dyn Scope>>,
    ) -> Self {
        Self {
            id,
            source,
            kind,
            action,
            scope,
            disabled: AtomicBool::new(false),
        }
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    /// Runtime switch; may be flipped while the engine runs
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Relaxed);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> TriggerInfo {
        TriggerInfo {
            id: self.id,
            kind: self.kind.type_name().to_string(),
            params: self.kind.params().to_string(),
            source: self.source.clone(),
            has_action: self.action.is_some(),
            disabled: self.is_disabled(),
        }
    }

    /// Evaluates the scope for this candidate. A panicking scope counts as
    /// a non-match for this candidate only.
    pub(crate) fn scope_accepts(&self, args: &TriggerArgs, ctx: &HookContext) -> bool {
        let Some(scope) = &self.scope else {
            return true;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| scope.accepts(args, ctx))) {
            Ok(yes) => yes,
            Err(_) => {
                warn!(trigger = %self, "scope predicate panicked, treating as no match");
                false
            }
        }
    }
}

impl fmt::Display for TriggerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.type_name(), self.kind.params())
    }
}

impl fmt::Debug for TriggerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerDef")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("has_action", &self.action.is_some())
            .field("has_scope", &self.scope.is_some())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}

/// Listing entry for a registered trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub id: TriggerId,
    /// `Hotkey` or `Autotext`
    pub kind: String,
    pub params: String,
    pub source: Source,
    pub has_action: bool,
    pub disabled: bool,
}

/// Ordered multi-map from bucket key to definitions
#[derive(Debug, Clone, Default)]
pub struct Registry {
    buckets: HashMap<u32, Vec<Arc<TriggerDef>>>,
    len: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a definition to its bucket, after any existing ones
    pub fn add(&mut self, key: u32, def: Arc<TriggerDef>) {
        self.buckets.entry(key).or_default().push(def);
        self.len += 1;
    }

    /// Removes a definition; returns whether it was present
    pub fn remove(&mut self, id: TriggerId) -> bool {
        let mut removed = false;
        self.buckets.retain(|_, defs| {
            let before = defs.len();
            defs.retain(|d| d.id != id);
            removed |= defs.len() != before;
            !defs.is_empty()
        });
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Definitions sharing `key`, in registration order
    pub fn bucket(&self, key: u32) -> &[Arc<TriggerDef>] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, id: TriggerId) -> Option<&Arc<TriggerDef>> {
        self.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TriggerDef>> {
        self.buckets.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::HotkeyArgs;
    use crate::hotkey::HotkeyFlags;
    use crate::keys::{Key, Modifiers};

    fn ctrl_k() -> TriggerKind {
        let hk = HotkeyTrigger::new(
            Key(b'K'),
            Modifiers::CTRL,
            Modifiers::empty(),
            HotkeyFlags::empty(),
            "Ctrl+K",
        )
        .unwrap();
        TriggerKind::Hotkey(hk)
    }

    fn def(id: u32) -> Arc<TriggerDef> {
        Arc::new(TriggerDef::new(
            TriggerId(id),
            Source::new("test.rs", id),
            ctrl_k(),
            None,
            None,
        ))
    }

    #[test]
    fn test_bucket_keeps_registration_order() {
        let mut reg = Registry::new();
        reg.add(75, def(1));
        reg.add(75, def(2));
        reg.add(76, def(3));
        let ids: Vec<_> = reg.bucket(75).iter().map(|d| d.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(reg.len(), 3);
        assert!(reg.bucket(99).is_empty());
        assert_eq!(reg.get(TriggerId(3)).map(|d| d.id), Some(TriggerId(3)));
    }

    #[test]
    fn test_remove() {
        let mut reg = Registry::new();
        reg.add(75, def(1));
        reg.add(75, def(2));
        assert!(reg.remove(TriggerId(1)));
        assert!(!reg.remove(TriggerId(1)));
        assert_eq!(reg.bucket(75).len(), 1);
        assert!(reg.remove(TriggerId(2)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_panicking_scope_is_no_match() {
        let scope: Arc<dyn Scope> =
            Arc::new(|_: &TriggerArgs, _: &HookContext| -> bool { panic!("broken scope") });
        let d = TriggerDef::new(TriggerId(1), Source::new("test.rs", 1), ctrl_k(), None, Some(scope));
        let args = TriggerArgs::Hotkey(HotkeyArgs {
            trigger: TriggerId(1),
            window: None,
            key: Key(b'K'),
            mods: Modifiers::CTRL,
        });
        assert!(!d.scope_accepts(&args, &HookContext::default()));
    }

    #[test]
    fn test_disabled_switch() {
        let d = def(1);
        assert!(!d.is_disabled());
        d.set_disabled(true);
        assert!(d.is_disabled());
        assert_eq!(d.to_string(), "Hotkey Ctrl+K");

        let info = d.info();
        assert_eq!(info.kind, "Hotkey");
        assert_eq!(info.params, "Ctrl+K");
        assert!(info.disabled);
        assert!(!info.has_action);
    }
}
