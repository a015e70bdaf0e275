// Keychord Binding Registry
// Per-key ordered binding lists plus the direct index used by manual triggers

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::combo::KeyDescriptor;
use crate::input::KeyEvent;
use crate::modifier::ModifierSet;
use crate::Action;

/// What a callback sees when it fires
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// The raw event, or `None` when fired through a manual trigger
    pub event: Option<&'a KeyEvent>,
    /// Label of the combo that matched (the full label for sequences)
    pub combo: &'a str,
    /// Sequence label when a sequence completed
    pub sequence: Option<&'a str>,
}

/// What a callback asks the host to do with the raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Let the event continue as normal
    #[default]
    Continue,
    /// Prevent the default action and stop propagation
    Stop,
}

impl From<()> for Propagation {
    fn from(_: ()) -> Self {
        Propagation::Continue
    }
}

impl From<bool> for Propagation {
    /// Only an explicit `false` stops the event
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Propagation::Continue
        } else {
            Propagation::Stop
        }
    }
}

/// Shared handle to a user callback
///
/// One callback may be reachable from several bindings (a bound list, the
/// direct index, the last step of a sequence), so it is shared, never cloned.
pub type Callback = Arc<Mutex<dyn FnMut(&Invocation<'_>) -> Propagation + Send>>;

/// Wrap a closure as a shared [`Callback`]
pub fn into_callback<F, R>(mut f: F) -> Callback
where
    F: FnMut(&Invocation<'_>) -> R + Send + 'static,
    R: Into<Propagation>,
{
    shared(move |invocation| f(invocation).into())
}

/// Callback that does nothing, used to unbind
pub fn noop_callback() -> Callback {
    shared(|_| Propagation::Continue)
}

fn shared<G>(g: G) -> Callback
where
    G: FnMut(&Invocation<'_>) -> Propagation + Send + 'static,
{
    Arc::new(Mutex::new(g))
}

/// Identity of one link in a multi-key sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceRef {
    /// Normalized label of the whole sequence, e.g. "g i"
    pub id: String,
    /// 0-based position of this link
    pub level: usize,
}

/// What happens when a binding fires
#[derive(Clone)]
pub enum BindingTarget {
    /// Plain combo: run the user callback
    Callback(Callback),
    /// One link of a multi-key sequence
    Link { sequence: SequenceRef, step: LinkStep },
}

/// What a sequence link does once it matches
#[derive(Clone)]
pub enum LinkStep {
    /// Intermediate link: move the sequence forward and wait for
    /// `next_action`
    Advance { next_action: Action },
    /// Final link: run the user callback, then settle
    Complete {
        callback: Callback,
        /// Suppress the keyup echo of the final key
        suppress_up: bool,
    },
}

impl fmt::Debug for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Callback(_) => write!(f, "Callback"),
            BindingTarget::Link { sequence, step } => {
                write!(f, "Link({}#{}, {:?})", sequence.id, sequence.level, step)
            }
        }
    }
}

impl fmt::Debug for LinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStep::Advance { next_action } => write!(f, "Advance({})", next_action),
            LinkStep::Complete { suppress_up, .. } => {
                write!(f, "Complete(suppress_up={})", suppress_up)
            }
        }
    }
}

/// A registered binding for one canonical key
#[derive(Debug, Clone)]
pub struct Binding {
    pub modifiers: ModifierSet,
    pub action: Action,
    /// Label of the chord text that produced this binding
    pub combo: String,
    pub target: BindingTarget,
}

impl Binding {
    /// Sequence identity, present iff the binding is one link of a sequence
    pub fn sequence(&self) -> Option<&SequenceRef> {
        match &self.target {
            BindingTarget::Link { sequence, .. } => Some(sequence),
            BindingTarget::Callback(_) => None,
        }
    }

    pub fn is_sequence(&self) -> bool {
        self.sequence().is_some()
    }

    /// Sequence level, if this is a sequence link
    pub fn level(&self) -> Option<usize> {
        self.sequence().map(|s| s.level)
    }

    /// Check whether `other` would be replaced by registering `self`
    fn replaces(&self, other: &Binding) -> bool {
        if self.action != other.action || self.modifiers != other.modifiers {
            return false;
        }
        match (self.sequence(), other.sequence()) {
            (None, None) => self.combo == other.combo,
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

/// Key into the direct index: normalized combo label plus the action it
/// was bound with (`None` when the action was inferred)
pub type DirectKey = (String, Option<Action>);

/// Stores every active binding, keyed by canonical key
#[derive(Default)]
pub struct BindingRegistry {
    by_key: IndexMap<String, Vec<Binding>>,
    direct: IndexMap<DirectKey, Callback>,
}

impl BindingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding for a parsed descriptor
    ///
    /// Any existing binding with the same identity (combo label for plain
    /// combos, sequence id and level for sequence links) and the same
    /// action and modifiers is removed first. Sequence links go to the
    /// front of the list so they are evaluated before plain combos.
    pub fn insert(
        &mut self,
        descriptor: &KeyDescriptor,
        combo: &str,
        target: BindingTarget,
    ) {
        let binding = Binding {
            modifiers: descriptor.modifiers.clone(),
            action: descriptor.action,
            combo: combo.to_string(),
            target,
        };

        let list = self.by_key.entry(descriptor.key.clone()).or_default();
        let before = list.len();
        list.retain(|existing| !binding.replaces(existing));
        if list.len() != before {
            log::debug!(
                "replaced {} binding(s) for '{}' on key '{}'",
                before - list.len(),
                combo,
                descriptor.key
            );
        }

        if binding.is_sequence() {
            list.insert(0, binding);
        } else {
            list.push(binding);
        }
    }

    /// Point the direct index for `(label, action)` at `callback`
    pub fn set_direct(&mut self, label: &str, action: Option<Action>, callback: Callback) {
        self.direct.insert((label.to_string(), action), callback);
    }

    /// Callback registered for a combo label, as used by manual triggers
    pub fn direct(&self, label: &str, action: Option<Action>) -> Option<&Callback> {
        self.direct.get(&(label.to_string(), action))
    }

    /// Bindings registered under a canonical key, in evaluation order
    pub fn bindings_for(&self, key: &str) -> &[Binding] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Canonical keys that have at least one binding
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(key, _)| key.as_str())
    }

    /// Total number of bindings across all keys
    pub fn len(&self) -> usize {
        self.by_key.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every binding and the direct index
    pub fn clear(&mut self) {
        self.by_key.clear();
        self.direct.clear();
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("by_key", &self.by_key)
            .field("direct", &self.direct.keys().collect::<Vec<_>>())
            .finish()
    }
}
