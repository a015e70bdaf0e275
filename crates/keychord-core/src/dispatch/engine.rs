// Keychord Dispatch Engine
// Binds combos to callbacks and resolves raw key events against them
//
// One engine owns its bindings, its sequence progress and its timers.
// Independent engines never share state; only the extra keycode table
// registered through `add_keycodes` is global.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::combo::{normalize_combo_text, sequence_steps};
use crate::config::{parse_with, ParsedCombination};
use crate::dispatch::matcher::{effective_modifiers, find_matches, max_sequence_level};
use crate::input::{DefaultPolicy, Element, KeyEvent, SuppressionContext, SuppressionPolicy};
use crate::key::default_primary_modifier;
use crate::mapping::{
    into_callback, noop_callback, BindingRegistry, BindingTarget, Callback, Invocation,
    LinkStep, Propagation, SequenceRef,
};
use crate::modifier::{Modifier, ModifierSet};
use crate::state::{SequenceProgress, DEFAULT_SEQUENCE_TIMEOUT, DEFAULT_SETTLE_DELAY};
use crate::Action;

/// Class that opts an editable element back into shortcut handling
pub const DEFAULT_OPT_IN_CLASS: &str = "keychord";

/// Tunables for an [`Engine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Inactivity window between two keys of a sequence
    pub sequence_timeout: Duration,
    /// Delay before the full reset that follows a completed sequence
    pub settle_delay: Duration,
    /// Elements with this class never suppress shortcuts
    pub opt_in_class: String,
    /// Modifier the `mod` alias stands for
    pub primary_modifier: Modifier,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            opt_in_class: DEFAULT_OPT_IN_CLASS.to_string(),
            primary_modifier: default_primary_modifier(),
        }
    }
}

/// Outcome of handling one raw event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Combo labels whose user callbacks ran, in firing order
    pub fired: Vec<String>,
    /// Sequences that moved one key further
    pub advanced: Vec<String>,
    /// The host should prevent the event's default action
    pub prevent_default: bool,
    /// The host should stop the event from propagating
    pub stop_propagation: bool,
}

impl Dispatch {
    /// Whether the event did anything at all
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty() && self.advanced.is_empty()
    }

    fn record(&mut self, label: &str, outcome: Propagation) {
        self.fired.push(label.to_string());
        if outcome == Propagation::Stop {
            self.prevent_default = true;
            self.stop_propagation = true;
        }
    }
}

/// Keyboard shortcut engine
///
/// # Examples
/// ```
/// use keychord_core::{Engine, KeyEvent};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let saves = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&saves);
///
/// let mut engine = Engine::new();
/// engine.bind("ctrl+s", move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     false
/// });
///
/// let dispatch = engine.handle(&KeyEvent::down(83).with_ctrl());
/// assert_eq!(dispatch.fired, vec!["ctrl+s".to_string()]);
/// assert!(dispatch.prevent_default);
/// assert_eq!(saves.load(Ordering::SeqCst), 1);
/// ```
pub struct Engine {
    options: EngineOptions,
    registry: BindingRegistry,
    progress: SequenceProgress,
    policy: Box<dyn SuppressionPolicy>,
    paused: bool,
}

impl Engine {
    /// Create an engine with default options
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Create an engine with custom options and the default policy
    pub fn with_options(options: EngineOptions) -> Self {
        let policy = DefaultPolicy::new(options.opt_in_class.clone(), None);
        Self::build(options, Box::new(policy))
    }

    /// Create an engine attached to `scope`
    ///
    /// Events originating from `scope` or anything inside it are never
    /// suppressed by the default policy, even in form fields.
    pub fn scoped(scope: Arc<Element>, options: EngineOptions) -> Self {
        let policy = DefaultPolicy::new(options.opt_in_class.clone(), Some(scope));
        Self::build(options, Box::new(policy))
    }

    fn build(options: EngineOptions, policy: Box<dyn SuppressionPolicy>) -> Self {
        let progress = SequenceProgress::new(options.sequence_timeout, options.settle_delay);
        Self {
            options,
            registry: BindingRegistry::new(),
            progress,
            policy,
            paused: false,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Replace the suppression policy
    ///
    /// The pause flag is still checked before the policy runs.
    pub fn set_suppression_policy(&mut self, policy: Box<dyn SuppressionPolicy>) {
        self.policy = policy;
    }

    // ==================== Binding ====================

    /// Bind a combo or a space-separated sequence to `callback`
    ///
    /// The action is inferred from the key. The callback may return `()`,
    /// a `bool` (`false` stops the event) or a [`Propagation`].
    pub fn bind<F, R>(&mut self, combo: &str, callback: F) -> &mut Self
    where
        F: FnMut(&Invocation<'_>) -> R + Send + 'static,
        R: Into<Propagation>,
    {
        self.bind_callback(combo, None, into_callback(callback))
    }

    /// Bind for an explicit action
    pub fn bind_action<F, R>(&mut self, combo: &str, action: Action, callback: F) -> &mut Self
    where
        F: FnMut(&Invocation<'_>) -> R + Send + 'static,
        R: Into<Propagation>,
    {
        self.bind_callback(combo, Some(action), into_callback(callback))
    }

    /// Bind several combos to one shared callback
    pub fn bind_all<I, S, F, R>(
        &mut self,
        combos: I,
        action: Option<Action>,
        callback: F,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&Invocation<'_>) -> R + Send + 'static,
        R: Into<Propagation>,
    {
        let callback = into_callback(callback);
        for combo in combos {
            self.bind_callback(combo.as_ref(), action, Arc::clone(&callback));
        }
        self
    }

    /// Bind an already shared callback
    ///
    /// Blank combos are ignored. Binding a combo again for the same action
    /// replaces the previous binding.
    pub fn bind_callback(
        &mut self,
        combo: &str,
        action: Option<Action>,
        callback: Callback,
    ) -> &mut Self {
        let label = normalize_combo_text(combo);
        let Some(parsed) = parse_with(&label, action, self.options.primary_modifier) else {
            log::warn!("ignoring blank combo {:?}", combo);
            return self;
        };

        self.registry.set_direct(&label, action, Arc::clone(&callback));

        match parsed {
            ParsedCombination::Single(desc) => {
                log::debug!("bind '{}' as {}", label, desc);
                self.registry
                    .insert(&desc, &label, BindingTarget::Callback(callback));
            }
            ParsedCombination::Sequence(steps) => {
                log::debug!("bind sequence '{}' ({} keys)", label, steps.len());
                self.progress.register(&label);

                let texts = sequence_steps(&label);
                let last = steps.len() - 1;
                for (level, (desc, text)) in steps.iter().zip(texts).enumerate() {
                    let step = if level == last {
                        LinkStep::Complete {
                            callback: Arc::clone(&callback),
                            suppress_up: desc.action != Action::Up,
                        }
                    } else {
                        LinkStep::Advance {
                            next_action: action.unwrap_or(steps[level + 1].action),
                        }
                    };
                    let sequence = SequenceRef {
                        id: label.clone(),
                        level,
                    };
                    self.registry
                        .insert(desc, text, BindingTarget::Link { sequence, step });
                }
            }
        }
        self
    }

    /// Make a combo do nothing
    ///
    /// The combo stays registered with a no-op callback, so a later
    /// [`Engine::trigger`] resolves to nothing happening.
    pub fn unbind(&mut self, combo: &str, action: Option<Action>) -> &mut Self {
        self.bind_callback(combo, action, noop_callback())
    }

    pub fn unbind_all<I, S>(&mut self, combos: I, action: Option<Action>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for combo in combos {
            self.unbind(combo.as_ref(), action);
        }
        self
    }

    /// Run the callback bound to `combo` without a key event
    ///
    /// Looks the combo up exactly as it was bound, action included. Bypasses
    /// pause and suppression. Returns whether a callback was found.
    pub fn trigger(&mut self, combo: &str, action: Option<Action>) -> bool {
        let label = normalize_combo_text(combo);
        let Some(callback) = self.registry.direct(&label, action).cloned() else {
            log::trace!("trigger '{}': nothing bound", label);
            return false;
        };

        let invocation = Invocation {
            event: None,
            combo: &label,
            sequence: None,
        };
        let mut guard = callback.lock();
        let run = &mut *guard;
        run(&invocation);
        true
    }

    /// Drop every binding and all sequence progress
    pub fn reset(&mut self) {
        log::debug!("engine reset");
        self.registry.clear();
        self.progress.clear();
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Merge extra key codes into the global non-printable key table
    pub fn add_keycodes<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        crate::key::add_keycodes(entries);
    }

    // ==================== Introspection ====================

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Number of keys of `sequence` typed so far
    pub fn sequence_level(&self, sequence: &str) -> usize {
        self.progress.level(&normalize_combo_text(sequence))
    }

    /// Earliest pending sequence timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.progress.next_deadline()
    }

    // ==================== Dispatch ====================

    /// Resolve a raw key event against the bindings
    pub fn handle(&mut self, event: &KeyEvent) -> Dispatch {
        self.handle_at(event, Instant::now())
    }

    /// Resolve a raw key event as if it arrived at `now`
    pub fn handle_at(&mut self, event: &KeyEvent, now: Instant) -> Dispatch {
        self.progress.expire(now);

        let Some(character) = event.canonical_character() else {
            log::trace!("dropping {} {}: no canonical key", event.action, event.code);
            return Dispatch::default();
        };

        if event.action.is_up() && self.progress.take_suppressed_up(&character) {
            log::trace!("dropping keyup '{}' after completed sequence", character);
            return Dispatch::default();
        }

        self.resolve(&character, event.modifiers(), event, now)
    }

    /// Resolve an event whose canonical key the host already knows
    pub fn handle_key(
        &mut self,
        character: &str,
        modifiers: ModifierSet,
        event: &KeyEvent,
    ) -> Dispatch {
        self.handle_key_at(character, modifiers, event, Instant::now())
    }

    pub fn handle_key_at(
        &mut self,
        character: &str,
        modifiers: ModifierSet,
        event: &KeyEvent,
        now: Instant,
    ) -> Dispatch {
        self.progress.expire(now);
        self.resolve(character, modifiers, event, now)
    }

    /// Fire any sequence timers that are due
    pub fn poll_timers(&mut self) -> bool {
        self.poll_timers_at(Instant::now())
    }

    pub fn poll_timers_at(&mut self, now: Instant) -> bool {
        self.progress.expire(now)
    }

    fn resolve(
        &mut self,
        character: &str,
        modifiers: ModifierSet,
        event: &KeyEvent,
        now: Instant,
    ) -> Dispatch {
        let modifiers = effective_modifiers(character, event, modifiers);
        let matches = find_matches(&self.registry, &self.progress, character, &modifiers, event);
        let max_level = max_sequence_level(&matches);

        let mut dispatch = Dispatch::default();
        let mut keep: HashSet<String> = HashSet::new();
        let mut processed_sequence = false;

        for binding in &matches {
            match &binding.target {
                BindingTarget::Link { sequence, step } => {
                    if Some(sequence.level) != max_level {
                        continue;
                    }
                    processed_sequence = true;
                    keep.insert(sequence.id.clone());
                    if !self.is_suppressed(event, &binding.combo, Some(sequence.id.as_str())) {
                        self.fire_link(sequence, step, character, event, now, &mut dispatch);
                    }
                }
                // Any sequence link firing on this event silences plain combos
                BindingTarget::Callback(callback) if !processed_sequence => {
                    self.fire(callback, &binding.combo, None, event, &mut dispatch);
                }
                BindingTarget::Callback(_) => {}
            }
        }

        // The keypress echoing a keydown that moved a sequence is not a
        // mismatch
        let ignored_press = event.action.is_character() && self.progress.ignore_next_press();
        if self.progress.expected_next() == Some(event.action)
            && !Modifier::is_modifier_key(character)
            && !ignored_press
        {
            self.progress.reset_except(&keep);
        }
        self.progress
            .set_ignore_next_press(processed_sequence && event.action.is_down());

        dispatch
    }

    fn fire_link(
        &mut self,
        link: &SequenceRef,
        step: &LinkStep,
        character: &str,
        event: &KeyEvent,
        now: Instant,
        dispatch: &mut Dispatch,
    ) {
        match step {
            LinkStep::Advance { next_action } => {
                self.progress.advance(&link.id, *next_action, now);
                dispatch.advanced.push(link.id.clone());
            }
            LinkStep::Complete {
                callback,
                suppress_up,
            } => {
                self.fire(callback, &link.id, Some(link.id.as_str()), event, dispatch);
                if *suppress_up {
                    self.progress.suppress_next_up(character);
                }
                self.progress.complete(&link.id, now);
            }
        }
    }

    fn fire(
        &self,
        callback: &Callback,
        combo: &str,
        sequence: Option<&str>,
        event: &KeyEvent,
        dispatch: &mut Dispatch,
    ) {
        if self.is_suppressed(event, combo, sequence) {
            return;
        }

        let invocation = Invocation {
            event: Some(event),
            combo,
            sequence,
        };
        let outcome = {
            let mut guard = callback.lock();
            let run = &mut *guard;
            run(&invocation)
        };
        dispatch.record(combo, outcome);
    }

    fn is_suppressed(&self, event: &KeyEvent, combo: &str, sequence: Option<&str>) -> bool {
        if self.paused {
            log::trace!("suppressed '{}': engine paused", combo);
            return true;
        }

        let ctx = SuppressionContext {
            event,
            element: event.target.as_deref(),
            combo,
            sequence,
        };
        if self.policy.should_suppress(&ctx) {
            log::trace!("suppressed '{}' by policy", combo);
            return true;
        }
        false
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("progress", &self.progress)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> impl FnMut(&Invocation<'_>) + Send + 'static {
        let log = Arc::clone(log);
        move |_| log.lock().push(name.to_string())
    }

    fn type_char(engine: &mut Engine, ch: char, now: Instant) -> Vec<Dispatch> {
        let code = ch.to_ascii_uppercase() as u32;
        vec![
            engine.handle_at(&KeyEvent::down(code), now),
            engine.handle_at(&KeyEvent::press_char(ch), now),
            engine.handle_at(&KeyEvent::up(code), now),
        ]
    }

    #[test]
    fn test_bind_and_fire_plain() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("a", recorder(&log, "a"));

        let now = Instant::now();
        type_char(&mut engine, 'a', now);
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[test]
    fn test_sequence_advances_and_completes() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("g i", recorder(&log, "g i"));

        let now = Instant::now();
        let dispatches = type_char(&mut engine, 'g', now);
        assert_eq!(dispatches[1].advanced, vec!["g i".to_string()]);
        assert_eq!(engine.sequence_level("g i"), 1);
        assert!(log.lock().is_empty());

        let dispatches = type_char(&mut engine, 'i', now);
        assert_eq!(dispatches[1].fired, vec!["g i".to_string()]);
        assert_eq!(*log.lock(), vec!["g i"]);

        // Settles shortly after completion
        engine.poll_timers_at(now + Duration::from_millis(10));
        assert_eq!(engine.sequence_level("g i"), 0);
    }

    #[test]
    fn test_sequence_links_carry_their_step() {
        let mut engine = Engine::new();
        engine.bind("g i", |_: &Invocation<'_>| {});

        let first = &engine.registry().bindings_for("g")[0];
        assert!(matches!(
            &first.target,
            BindingTarget::Link {
                sequence: SequenceRef { level: 0, .. },
                step: LinkStep::Advance {
                    next_action: Action::Press
                },
            }
        ));

        let last = &engine.registry().bindings_for("i")[0];
        assert!(matches!(
            &last.target,
            BindingTarget::Link {
                sequence: SequenceRef { level: 1, .. },
                step: LinkStep::Complete {
                    suppress_up: true,
                    ..
                },
            }
        ));
        assert_eq!(last.sequence().map(|s| s.id.as_str()), Some("g i"));
    }

    #[test]
    fn test_unbounded_sequence_timeout() {
        let log: Log = Arc::default();
        let mut engine = Engine::with_options(EngineOptions {
            sequence_timeout: Duration::MAX,
            ..EngineOptions::default()
        });
        engine.bind("g i", recorder(&log, "g i"));

        let now = Instant::now();
        type_char(&mut engine, 'g', now);
        assert_eq!(engine.sequence_level("g i"), 1);
        assert_eq!(engine.next_deadline(), None);

        type_char(&mut engine, 'i', now + Duration::from_secs(3600));
        assert_eq!(*log.lock(), vec!["g i"]);
    }

    #[test]
    fn test_sequence_callback_sees_full_label() {
        let seen: Arc<Mutex<Vec<(String, Option<String>)>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let mut engine = Engine::new();
        engine.bind("g  i", move |inv: &Invocation<'_>| {
            sink.lock()
                .push((inv.combo.to_string(), inv.sequence.map(str::to_string)));
        });

        let now = Instant::now();
        type_char(&mut engine, 'g', now);
        type_char(&mut engine, 'i', now);
        assert_eq!(
            *seen.lock(),
            vec![("g i".to_string(), Some("g i".to_string()))]
        );
    }

    #[test]
    fn test_keyup_after_completion_is_swallowed() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("g i", recorder(&log, "g i"));
        engine.bind_action("i", Action::Up, recorder(&log, "i up"));

        let now = Instant::now();
        type_char(&mut engine, 'g', now);
        type_char(&mut engine, 'i', now);
        assert_eq!(*log.lock(), vec!["g i"]);

        // Only the first keyup is swallowed
        engine.handle_at(&KeyEvent::up(73), now);
        assert_eq!(*log.lock(), vec!["g i", "i up"]);
    }

    #[test]
    fn test_keydown_sequence_ignores_keypress_echo() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("ctrl+k c", recorder(&log, "ctrl+k c"));

        let now = Instant::now();
        engine.handle_at(&KeyEvent::down(75).with_ctrl(), now);
        assert_eq!(engine.sequence_level("ctrl+k c"), 1);

        // The echo is a keypress like the expected next key but must not
        // reset the sequence
        engine.handle_at(&KeyEvent::press_char('k').with_ctrl(), now);
        assert_eq!(engine.sequence_level("ctrl+k c"), 1);
        engine.handle_at(&KeyEvent::up(75), now);
        engine.handle_at(&KeyEvent::up(17), now);

        type_char(&mut engine, 'c', now);
        assert_eq!(*log.lock(), vec!["ctrl+k c"]);
    }

    #[test]
    fn test_modifier_key_does_not_reset_sequence() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("a shift+b", recorder(&log, "seq"));

        let now = Instant::now();
        type_char(&mut engine, 'a', now);
        // expected_next is keydown here since shift+b forces keydown
        engine.handle_at(&KeyEvent::down(16).with_shift(), now);
        assert_eq!(engine.sequence_level("a shift+b"), 1);

        engine.handle_at(&KeyEvent::down(66).with_shift(), now);
        assert_eq!(*log.lock(), vec!["seq"]);
    }

    #[test]
    fn test_deeper_sequence_wins() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("b c", recorder(&log, "b c"));
        engine.bind("a b", recorder(&log, "a b"));
        engine.bind("b", recorder(&log, "b"));

        let now = Instant::now();
        type_char(&mut engine, 'a', now);
        let dispatches = type_char(&mut engine, 'b', now);

        // "a b" is at level 1, "b c" only at level 0
        assert_eq!(dispatches[1].fired, vec!["a b".to_string()]);
        assert!(dispatches[1].advanced.is_empty());
        assert_eq!(*log.lock(), vec!["a b"]);
    }

    #[test]
    fn test_plain_combo_silenced_by_sequence_link() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("g", recorder(&log, "g"));
        engine.bind("g i", recorder(&log, "g i"));

        let now = Instant::now();
        type_char(&mut engine, 'g', now);
        assert!(log.lock().is_empty());
        assert_eq!(engine.sequence_level("g i"), 1);
    }

    #[test]
    fn test_explicit_action_applies_to_every_step() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind_action("g i", Action::Up, recorder(&log, "g i"));

        let now = Instant::now();
        type_char(&mut engine, 'g', now);
        assert_eq!(engine.sequence_level("g i"), 1);
        type_char(&mut engine, 'i', now);
        assert_eq!(*log.lock(), vec!["g i"]);
    }

    #[test]
    fn test_unbind_keeps_trigger_quiet() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("ctrl+s", recorder(&log, "save"));
        engine.unbind("ctrl+s", None);

        assert!(engine.trigger("ctrl+s", None));
        engine.handle_at(&KeyEvent::down(83).with_ctrl(), Instant::now());
        assert!(log.lock().is_empty());
        assert_eq!(engine.registry().bindings_for("s").len(), 1);
    }

    #[test]
    fn test_trigger_respects_bound_action() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind_action("x", Action::Up, recorder(&log, "x"));

        assert!(!engine.trigger("x", None));
        assert!(engine.trigger("x", Some(Action::Up)));
        assert_eq!(*log.lock(), vec!["x"]);
    }

    #[test]
    fn test_trigger_only_knows_full_sequence_label() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("g i", recorder(&log, "g i"));

        assert!(!engine.trigger("g", None));
        assert!(!engine.trigger("i", None));
        assert!(log.lock().is_empty());
        assert!(engine.trigger("g i", None));
    }

    #[test]
    fn test_trigger_bypasses_pause() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("g i", recorder(&log, "g i"));
        engine.pause();

        assert!(engine.trigger("g i", None));
        assert_eq!(*log.lock(), vec!["g i"]);
    }

    #[test]
    fn test_bind_all_shares_callback() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind_all(["a", "b"], None, recorder(&log, "ab"));

        let now = Instant::now();
        type_char(&mut engine, 'a', now);
        type_char(&mut engine, 'b', now);
        assert_eq!(*log.lock(), vec!["ab", "ab"]);

        engine.unbind_all(["a", "b"], None);
        type_char(&mut engine, 'a', now);
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_blank_combo_is_ignored() {
        let mut engine = Engine::new();
        engine.bind("   ", |_: &Invocation<'_>| ());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_reset_clears_bindings_and_progress() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("g i", recorder(&log, "g i"));

        let now = Instant::now();
        type_char(&mut engine, 'g', now);
        engine.reset();

        assert_eq!(engine.sequence_level("g i"), 0);
        assert!(engine.registry().is_empty());
        assert!(!engine.trigger("g i", None));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_custom_policy() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("a", recorder(&log, "a"));
        engine.bind("b", recorder(&log, "b"));
        engine.set_suppression_policy(Box::new(|ctx: &SuppressionContext<'_>| ctx.combo == "a"));

        let now = Instant::now();
        type_char(&mut engine, 'a', now);
        type_char(&mut engine, 'b', now);
        assert_eq!(*log.lock(), vec!["b"]);
    }

    #[test]
    fn test_propagation_flags() {
        let mut engine = Engine::new();
        engine.bind("a", |_: &Invocation<'_>| Propagation::Stop);
        engine.bind("b", |_: &Invocation<'_>| true);

        let now = Instant::now();
        let stopped = engine.handle_at(&KeyEvent::press_char('a'), now);
        assert!(stopped.prevent_default && stopped.stop_propagation);

        let passed = engine.handle_at(&KeyEvent::press_char('b'), now);
        assert_eq!(passed.fired, vec!["b".to_string()]);
        assert!(!passed.prevent_default && !passed.stop_propagation);
    }

    #[test]
    fn test_handle_key_skips_normalization() {
        let log: Log = Arc::default();
        let mut engine = Engine::new();
        engine.bind("ctrl+space", recorder(&log, "space"));

        let event = KeyEvent::down(0).with_ctrl();
        let dispatch = engine.handle_key("space", event.modifiers(), &event);
        assert_eq!(dispatch.fired, vec!["ctrl+space".to_string()]);
    }

    #[test]
    fn test_primary_modifier_option() {
        let log: Log = Arc::default();
        let mut engine = Engine::with_options(EngineOptions {
            primary_modifier: Modifier::Meta,
            ..EngineOptions::default()
        });
        engine.bind("mod+k", recorder(&log, "k"));

        let now = Instant::now();
        engine.handle_at(&KeyEvent::down(75).with_ctrl(), now);
        engine.handle_at(&KeyEvent::down(75).with_meta(), now);
        assert_eq!(*log.lock(), vec!["k"]);
    }
}
