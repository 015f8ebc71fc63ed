//! Autotext matching on the hook thread
//!
//! Key-downs are converted to characters and appended to the typed-text
//! buffer; after each character the registry is searched with the bucket
//! keys of the last one to four characters.

use std::sync::Arc;

use tracing::trace;

use crate::args::{AutotextArgs, TriggerArgs};
use crate::context::{HookContext, KeyEvent, LayoutId, WindowId};
use crate::keys::{Key, Modifiers};
use crate::registry::{Registry, TriggerDef, TriggerKind};

use super::buffer::{TypedBuffer, TypedChar};
use super::resolve::{KeyInput, KeyResolver, KeyTranslator, Translation};
use super::trigger::{AutotextFlags, AutotextTrigger, PostfixKey, PostfixType};

/// How the text in the buffer was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Postfix {
    /// Last character is a word character
    None,
    /// Last character is a delimiter
    Delim(char),
    /// The postfix key was pressed and released
    Key,
}

/// What a pass feeds into the buffer
#[derive(Debug, Clone, Copy)]
enum Input {
    Char(char),
    PostfixKey,
}

/// Matches typed text against autotext definitions
pub struct AutotextMatcher {
    buffer: TypedBuffer,
    resolver: KeyResolver,
    postfix_key: PostfixKey,
    word_chars_plus: Vec<char>,
    default_layout: LayoutId,
    /// The postfix modifier went down alone and may count on release
    single_pk: bool,
    focus: Option<WindowId>,
}

impl AutotextMatcher {
    pub fn new(translator: Box<dyn KeyTranslator>) -> Self {
        Self {
            buffer: TypedBuffer::new(),
            resolver: KeyResolver::new(translator),
            postfix_key: PostfixKey::default(),
            word_chars_plus: Vec::new(),
            default_layout: LayoutId::US,
            single_pk: false,
            focus: None,
        }
    }

    pub fn with_postfix_key(mut self, key: PostfixKey) -> Self {
        self.postfix_key = key;
        self
    }

    /// Extra characters treated as word characters, like `"_#"`
    pub fn with_word_chars(mut self, chars: &str) -> Self {
        self.word_chars_plus = chars.chars().collect();
        self
    }

    /// Layout used for events that do not carry one
    pub fn with_default_layout(mut self, layout: LayoutId) -> Self {
        self.default_layout = layout;
        self
    }

    pub fn buffer(&self) -> &TypedBuffer {
        &self.buffer
    }

    /// Forgets the typed text, the pending dead key and a half-pressed
    /// postfix key
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.resolver.clear();
        self.single_pk = false;
    }

    /// Full reset on engine start and stop
    pub fn restart(&mut self) {
        self.reset();
        self.focus = None;
    }

    /// Processes one event. Never swallows it; a match is stored in `ctx`.
    pub fn hook_proc(
        &mut self,
        ev: &KeyEvent,
        ctx: &mut HookContext,
        registry: &Registry,
        disabled_all: bool,
    ) {
        if ev.up {
            if self.single_pk {
                self.single_pk = false;
                if self.is_postfix_key(ev, ctx.mod_this) {
                    trace!("postfix key released");
                    self.step(Input::PostfixKey, ev.focus, ctx, registry, disabled_all);
                }
            }
            return;
        }

        if !ctx.mod_this.is_empty() {
            self.single_pk =
                self.is_postfix_key(ev, ctx.mod_this) && ctx.mods == self.postfix_key.modifier();
            return;
        }
        self.single_pk = false;

        // Alt+key types nothing; with Ctrl it may be AltGr
        let alt_only =
            ctx.mods.contains(Modifiers::ALT) && !ctx.mods.intersects(Modifiers::CTRL | Modifiers::SHIFT);
        // no focus: menu or move/size loop
        let focus = match ev.focus {
            Some(focus) if !alt_only && !ev.vk.is_navigation() => focus,
            _ => {
                self.reset();
                return;
            }
        };

        let translation = if ev.vk == Key::PACKET {
            char::from_u32(ev.scan).map_or(Translation::None, Translation::One)
        } else {
            self.resolver.resolve(KeyInput {
                vk: ev.vk,
                scan: ev.scan,
                mods: ctx.mods,
                caps_lock: ev.caps_lock,
                layout: ev.layout.unwrap_or(self.default_layout),
            })
        };
        match translation {
            Translation::Dead => {}
            Translation::None => {
                let harmless = matches!(
                    ev.vk,
                    Key::CAPS_LOCK | Key::NUM_LOCK | Key::SCROLL_LOCK | Key::INSERT | Key::DELETE
                );
                if !(harmless && ctx.mods.is_empty()) {
                    self.reset();
                }
            }
            chars => {
                for c in chars.chars() {
                    self.step(Input::Char(c), Some(focus), ctx, registry, disabled_all);
                }
            }
        }
    }

    fn is_postfix_key(&self, ev: &KeyEvent, mod_this: Modifiers) -> bool {
        mod_this == self.postfix_key.modifier() && self.postfix_key.accepts(ev.vk) && !ev.injected
    }

    fn is_word_char(&self, c: char) -> bool {
        c.is_alphanumeric() || self.word_chars_plus.contains(&c)
    }

    /// Feeds one character or the postfix key, then looks for a match
    fn step(
        &mut self,
        input: Input,
        focus: Option<WindowId>,
        ctx: &mut HookContext,
        registry: &Registry,
        disabled_all: bool,
    ) {
        if focus != self.focus {
            self.reset();
            self.focus = focus;
        }
        if focus.is_none() {
            return;
        }

        let (mut postfix, mut nc) = match input {
            Input::PostfixKey => (Postfix::Key, self.buffer.len()),
            Input::Char(c) => {
                if c < ' ' || c == '\x7f' {
                    match c {
                        '\x08' => {
                            self.buffer.pop();
                            return;
                        }
                        '\t' | '\r' | '\n' => {}
                        // Ctrl+C, Esc and the like
                        _ => {
                            self.reset();
                            return;
                        }
                    }
                }
                let is_word = self.is_word_char(c);
                if !self.buffer.push(TypedChar::new(c, is_word)) {
                    return;
                }
                if is_word {
                    (Postfix::None, self.buffer.len())
                } else {
                    (Postfix::Delim(c), self.buffer.len() - 1)
                }
            }
        };
        if nc == 0 {
            return;
        }

        loop {
            if let Some((def, args)) = self.find(nc, postfix, ctx, registry, disabled_all) {
                trace!(trigger = %def, "autotext matched");
                self.reset();
                ctx.set_fired(def, args);
                return;
            }
            // a text may itself end with the delimiter
            if let Postfix::Delim(_) = postfix {
                postfix = Postfix::None;
                nc += 1;
                continue;
            }
            return;
        }
    }

    /// First live definition matching the `nc` characters before the
    /// postfix
    fn find(
        &self,
        nc: usize,
        postfix: Postfix,
        ctx: &HookContext,
        registry: &Registry,
        disabled_all: bool,
    ) -> Option<(Arc<TriggerDef>, TriggerArgs)> {
        let mut key = 0u32;
        for (j, i) in (0..nc).rev().take(4).enumerate() {
            key |= (self.buffer[i].low as u32 & 0xFF) << (8 * j);
            for def in registry.bucket(key) {
                let TriggerKind::Autotext(x) = &def.kind else {
                    continue;
                };
                let Some(start) = self.text_start(x, nc) else {
                    continue;
                };
                if !postfix_accepted(x, postfix) {
                    continue;
                }
                if disabled_all || def.is_disabled() {
                    continue;
                }

                let has_postfix_char = matches!(postfix, Postfix::Delim(_));
                let end = if has_postfix_char { nc + 1 } else { nc };
                let args = TriggerArgs::Autotext(AutotextArgs {
                    trigger: def.id,
                    window: ctx.window,
                    text: self.buffer.text(start..end),
                    has_postfix_char,
                    shift_left: x.flags().contains(AutotextFlags::SHIFT_LEFT),
                    flags: x.flags(),
                });
                if !def.scope_accepts(&args, ctx) {
                    continue;
                }
                return Some((Arc::clone(def), args));
            }
        }
        None
    }

    /// Where the trigger text starts if the buffer's first `nc` characters
    /// end with it as a whole word
    fn text_start(&self, x: &AutotextTrigger, nc: usize) -> Option<usize> {
        let start = nc.checked_sub(x.len())?;
        if start > 0 && self.buffer[start - 1].is_word {
            return None;
        }
        let match_case = x.flags().contains(AutotextFlags::MATCH_CASE);
        let same = x.text().chars().enumerate().all(|(j, s)| {
            let tc = &self.buffer[start + j];
            s == if match_case { tc.c } else { tc.low }
        });
        same.then_some(start)
    }
}

fn postfix_accepted(x: &AutotextTrigger, postfix: Postfix) -> bool {
    let type_ok = match x.postfix_type() {
        PostfixType::CharOrKey => postfix != Postfix::None,
        PostfixType::Char => matches!(postfix, Postfix::Delim(_)),
        PostfixType::Key => postfix == Postfix::Key,
        PostfixType::None => true,
    };
    match (x.postfix_chars(), postfix) {
        (Some(chars), Postfix::Delim(c)) => type_ok && chars.contains(c),
        _ => type_ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autotext::buffer::CAPACITY;
    use crate::autotext::TableTranslator;
    use crate::keys::ModifierState;
    use crate::registry::{Action, Scope, Source, TriggerId};

    const WIN: WindowId = WindowId(1);

    struct Harness {
        matcher: AutotextMatcher,
        state: ModifierState,
        registry: Registry,
        window: WindowId,
        layout: LayoutId,
        fired: Vec<AutotextArgs>,
        next_id: u32,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_matcher(AutotextMatcher::new(Box::new(TableTranslator)))
        }

        fn with_matcher(matcher: AutotextMatcher) -> Self {
            Self {
                matcher,
                state: ModifierState::default(),
                registry: Registry::new(),
                window: WIN,
                layout: LayoutId::US,
                fired: Vec::new(),
                next_id: 1,
            }
        }

        fn add(&mut self, text: &str, flags: AutotextFlags, postfix: PostfixType) -> TriggerId {
            self.add_full(text, flags, postfix, None, None)
        }

        fn add_full(
            &mut self,
            text: &str,
            flags: AutotextFlags,
            postfix: PostfixType,
            postfix_chars: Option<&str>,
            scope: Option<Arc<dyn Scope>>,
        ) -> TriggerId {
            let t = AutotextTrigger::new(text, flags, postfix, postfix_chars).unwrap();
            let key = t.bucket_key();
            let id = TriggerId(self.next_id);
            self.next_id += 1;
            let action: Action = Arc::new(|_| Ok(()));
            let source = Source::new("test.rs", id.0);
            let def = TriggerDef::new(id, source, TriggerKind::Autotext(t), Some(action), scope);
            self.registry.add(key, Arc::new(def));
            id
        }

        fn send(&mut self, mut ev: KeyEvent) {
            ev.window = Some(self.window);
            ev.focus = ev.focus.map(|_| self.window);
            ev.layout = Some(self.layout);
            let mod_this = self.state.apply(ev.vk, ev.up);
            let mut ctx = HookContext::new(&ev, &self.state, mod_this);
            self.matcher.hook_proc(&ev, &mut ctx, &self.registry, false);
            if let Some(TriggerArgs::Autotext(args)) = ctx.take_fired().map(|f| f.args) {
                self.fired.push(args);
            }
        }

        fn tap(&mut self, key: Key) {
            self.send(KeyEvent::down(key).in_window(WIN));
            self.send(KeyEvent::up(key).in_window(WIN));
        }

        fn chord(&mut self, modifier: Key, key: Key) {
            self.send(KeyEvent::down(modifier).in_window(WIN));
            self.tap(key);
            self.send(KeyEvent::up(modifier).in_window(WIN));
        }

        fn type_str(&mut self, s: &str) {
            for c in s.chars() {
                let (key, shift) = key_for(c);
                if shift {
                    self.chord(Key::LSHIFT, key);
                } else {
                    self.tap(key);
                }
            }
        }

        fn fired_texts(&self) -> Vec<&str> {
            self.fired.iter().map(|a| a.text.as_str()).collect()
        }
    }

    fn key_for(c: char) -> (Key, bool) {
        match c {
            'a'..='z' => (Key(c.to_ascii_uppercase() as u8), false),
            'A'..='Z' | '0'..='9' => (Key(c as u8), c.is_ascii_uppercase()),
            ' ' => (Key::SPACE, false),
            '\r' => (Key::ENTER, false),
            '#' => (Key(b'3'), true),
            '(' => (Key(b'9'), true),
            '.' => (Key::OEM_PERIOD, false),
            '>' => (Key::OEM_PERIOD, true),
            '-' => (Key::OEM_MINUS, false),
            '_' => (Key::OEM_MINUS, true),
            ',' => (Key::OEM_COMMA, false),
            _ => panic!("no key for {c:?}"),
        }
    }

    #[test]
    fn test_end_to_end_addr() {
        let mut h = Harness::new();
        let id = h.add("#addr", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("#addr");
        assert!(h.fired.is_empty());
        h.type_str(" ");
        assert_eq!(h.fired.len(), 1);
        let args = &h.fired[0];
        assert_eq!(args.trigger, id);
        assert_eq!(args.text, "#addr ");
        assert!(args.has_postfix_char);
        assert_eq!(args.postfix_char(), Some(' '));
        assert_eq!(args.window, Some(WIN));
        assert!(h.matcher.buffer().is_empty());
    }

    #[test]
    fn test_word_boundary() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("abtw ");
        assert!(h.fired.is_empty());
        h.type_str("btw ");
        h.type_str("(btw,");
        assert_eq!(h.fired_texts(), vec!["btw ", "btw,"]);
    }

    #[test]
    fn test_superstring_does_not_fire() {
        let mut h = Harness::new();
        h.add("#addr", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("#address ");
        assert!(h.fired.is_empty());
    }

    #[test]
    fn test_word_boundary_inside_word() {
        let mut h = Harness::new();
        h.add("ab", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("cab ");
        assert!(h.fired.is_empty());
        h.type_str("x ab ");
        assert_eq!(h.fired_texts(), vec!["ab "]);
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let mut h = Harness::new();
        h.add("#hi", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("#hi ");
        h.type_str("#HI ");
        h.type_str("#Hi ");
        assert_eq!(h.fired_texts(), vec!["#hi ", "#HI ", "#Hi "]);
        assert_eq!(h.fired[1].replace_plan("hello").text, "HELLO");
    }

    #[test]
    fn test_word_chars_plus() {
        let matcher = AutotextMatcher::new(Box::new(TableTranslator)).with_word_chars("_");
        let mut h = Harness::with_matcher(matcher);
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("x_btw ");
        assert!(h.fired.is_empty());
        h.type_str("x-btw ");
        assert_eq!(h.fired_texts(), vec!["btw "]);
    }

    #[test]
    fn test_case_handling() {
        let mut h = Harness::new();
        h.add("Btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("BTW ");
        assert_eq!(h.fired_texts(), vec!["BTW "]);

        let mut h = Harness::new();
        h.add("Btw", AutotextFlags::MATCH_CASE, PostfixType::CharOrKey);
        h.type_str("btw BTW ");
        assert!(h.fired.is_empty());
        h.type_str("Btw ");
        assert_eq!(h.fired_texts(), vec!["Btw "]);
    }

    #[test]
    fn test_dead_key_combines() {
        let mut h = Harness::new();
        h.layout = LayoutId::US_INTERNATIONAL;
        h.add("café", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("caf");
        h.tap(Key::OEM_7);
        h.type_str("e ");
        assert_eq!(h.fired_texts(), vec!["café "]);
    }

    #[test]
    fn test_focus_change_resets() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("bt");
        h.window = WindowId(2);
        h.type_str("w ");
        assert!(h.fired.is_empty());
        h.type_str("btw ");
        assert_eq!(h.fired.len(), 1);
    }

    #[test]
    fn test_no_focus_resets() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("bt");
        h.send(KeyEvent::down(Key(b'X')));
        h.type_str("w ");
        assert!(h.fired.is_empty());
    }

    #[test]
    fn test_postfix_key() {
        let mut h = Harness::new();
        h.add("sig", AutotextFlags::empty(), PostfixType::Key);
        h.type_str("sig ");
        assert!(h.fired.is_empty());

        h.type_str("sig");
        h.tap(Key::LCTRL);
        assert_eq!(h.fired_texts(), vec!["sig"]);
        assert!(!h.fired[0].has_postfix_char);

        // Ctrl used for a shortcut does not count
        h.type_str(" sig");
        h.send(KeyEvent::down(Key::LCTRL).in_window(WIN));
        h.send(KeyEvent::down(Key::LSHIFT).in_window(WIN));
        h.send(KeyEvent::up(Key::LSHIFT).in_window(WIN));
        h.send(KeyEvent::up(Key::LCTRL).in_window(WIN));
        assert_eq!(h.fired.len(), 1);
    }

    #[test]
    fn test_sided_postfix_key() {
        let pk = PostfixKey::new(Key::RSHIFT).unwrap();
        let matcher = AutotextMatcher::new(Box::new(TableTranslator)).with_postfix_key(pk);
        let mut h = Harness::with_matcher(matcher);
        h.add("sig", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("sig");
        h.tap(Key::LSHIFT);
        h.tap(Key::LCTRL);
        assert!(h.fired.is_empty());
        h.tap(Key::RSHIFT);
        assert_eq!(h.fired_texts(), vec!["sig"]);
    }

    #[test]
    fn test_injected_postfix_key_ignored() {
        let mut h = Harness::new();
        h.add("sig", AutotextFlags::empty(), PostfixType::Key);
        h.type_str("sig");
        let mut down = KeyEvent::down(Key::LCTRL).in_window(WIN);
        down.injected = true;
        h.send(down);
        h.send(KeyEvent::up(Key::LCTRL).in_window(WIN));
        assert!(h.fired.is_empty());
    }

    #[test]
    fn test_backspace() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("btx");
        h.tap(Key::BACK);
        h.type_str("w ");
        assert_eq!(h.fired_texts(), vec!["btw "]);
    }

    #[test]
    fn test_control_char_resets() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("bt");
        h.chord(Key::LCTRL, Key(b'C'));
        h.type_str("w ");
        assert!(h.fired.is_empty());
    }

    #[test]
    fn test_navigation_and_alt_reset() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("bt");
        h.tap(Key::LEFT);
        h.type_str("w ");
        h.type_str("bt");
        h.chord(Key::LALT, Key(b'F'));
        h.type_str("w ");
        assert!(h.fired.is_empty());
    }

    #[test]
    fn test_lock_keys_do_not_reset() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("bt");
        h.tap(Key::INSERT);
        h.tap(Key::NUM_LOCK);
        h.type_str("w ");
        assert_eq!(h.fired.len(), 1);

        h.type_str("bt");
        h.tap(Key::F1);
        h.type_str("w ");
        assert_eq!(h.fired.len(), 1);
    }

    #[test]
    fn test_text_ending_with_delimiter() {
        let mut h = Harness::new();
        h.add("e.g.", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.add("->", AutotextFlags::empty(), PostfixType::None);
        h.type_str("e.g.");
        assert!(h.fired.is_empty());
        h.type_str(" ");
        assert_eq!(h.fired_texts(), vec!["e.g. "]);

        h.type_str("->");
        assert_eq!(h.fired_texts(), vec!["e.g. ", "->"]);
        assert!(!h.fired[1].has_postfix_char);
    }

    #[test]
    fn test_postfix_type_char_and_chars() {
        let mut h = Harness::new();
        h.add_full("btw", AutotextFlags::empty(), PostfixType::Char, Some("."), None);
        h.type_str("btw");
        h.tap(Key::LCTRL);
        h.type_str(" btw ");
        assert!(h.fired.is_empty());
        h.type_str("btw.");
        assert_eq!(h.fired_texts(), vec!["btw."]);
    }

    #[test]
    fn test_postfix_type_none_fires_immediately() {
        let mut h = Harness::new();
        h.add("qq", AutotextFlags::empty(), PostfixType::None);
        h.type_str("qq");
        assert_eq!(h.fired_texts(), vec!["qq"]);
    }

    #[test]
    fn test_first_live_candidate_wins() {
        let mut h = Harness::new();
        let never: Arc<dyn Scope> = Arc::new(|_: &TriggerArgs, _: &HookContext| false);
        h.add_full("btw", AutotextFlags::empty(), PostfixType::CharOrKey, None, Some(never));
        let second = h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        let third = h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        h.type_str("btw ");
        assert_eq!(h.fired.len(), 1);
        assert_eq!(h.fired[0].trigger, second);
        assert_ne!(h.fired[0].trigger, third);
    }

    #[test]
    fn test_packet_events() {
        let mut h = Harness::new();
        h.add("ok", AutotextFlags::empty(), PostfixType::CharOrKey);
        for c in "ok!".chars() {
            h.send(KeyEvent::down(Key::PACKET).with_scan(c as u32).in_window(WIN));
        }
        assert_eq!(h.fired_texts(), vec!["ok!"]);
    }

    #[test]
    fn test_buffer_stays_bounded() {
        let mut h = Harness::new();
        h.add("btw", AutotextFlags::empty(), PostfixType::CharOrKey);
        for _ in 0..100 {
            h.type_str("lorem ipsum ");
            assert!(h.matcher.buffer().len() <= CAPACITY);
        }
        h.type_str("btw ");
        assert_eq!(h.fired.len(), 1);
    }
}
