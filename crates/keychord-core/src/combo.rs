// Keychord Combo Types
// Normalized descriptors produced by parsing one combo token

use std::fmt;

use crate::modifier::{Modifier, ModifierSet};
use crate::Action;

/// One parsed key of a combination string
///
/// `key` is the canonical trigger key and is never empty. `modifiers` is
/// the deduplicated set that must be held, and `action` the event phase
/// the binding listens for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyDescriptor {
    pub key: String,
    pub modifiers: ModifierSet,
    pub action: Action,
}

impl KeyDescriptor {
    /// Create a descriptor from its parts
    pub fn new(key: impl Into<String>, modifiers: ModifierSet, action: Action) -> Self {
        Self {
            key: key.into(),
            modifiers,
            action,
        }
    }

    /// Check whether the trigger key is itself a modifier key
    pub fn is_modifier_key(&self) -> bool {
        Modifier::is_modifier_key(&self.key)
    }

    /// Render the descriptor back into combo syntax, e.g. `ctrl+shift+k`
    ///
    /// The literal plus key is written as its `plus` alias so the output can
    /// be parsed again.
    pub fn to_combo_string(&self) -> String {
        let key = if self.key == "+" { "plus" } else { self.key.as_str() };
        let mut parts: Vec<&str> = self
            .modifiers
            .iter()
            .map(|m| m.key_name())
            .filter(|name| *name != key)
            .collect();
        parts.push(key);
        parts.join("+")
    }
}

impl fmt::Display for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.to_combo_string(), self.action)
    }
}

/// Collapse runs of whitespace in a combo string to single spaces
///
/// The normalized form is the label a combo is known by in the registry,
/// so "g   i" and "g i" name the same sequence.
pub fn normalize_combo_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a normalized combo label into its sequence steps
pub fn sequence_steps(label: &str) -> Vec<&str> {
    label.split(' ').filter(|step| !step.is_empty()).collect()
}
