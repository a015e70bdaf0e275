// Keychord Modifier System
// Represents combo modifiers (Shift, Ctrl, Alt, Meta) and deduplicated sets of them

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Represents a keyboard combo modifier, such as Shift or Meta
///
/// The canonical names double as the key names the key tables produce for
/// the modifier keys themselves, so a modifier can also be a trigger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Meta,
}

impl Modifier {
    /// Get the modifier whose canonical key name is `name`
    pub fn from_key_name(name: &str) -> Option<Modifier> {
        Modifier::from_str(name).ok()
    }

    /// Check if a canonical key name is one of the modifier keys
    pub fn is_modifier_key(name: &str) -> bool {
        Self::from_key_name(name).is_some()
    }

    /// Canonical key name of this modifier
    pub fn key_name(self) -> &'static str {
        match self {
            Modifier::Shift => "shift",
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Meta => "meta",
        }
    }
}

/// An order-independent, deduplicated set of modifiers
///
/// Kept sorted so that equality and hashing never depend on the order the
/// modifiers were written in ("ctrl+shift+a" == "shift+ctrl+a").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModifierSet {
    mods: SmallVec<[Modifier; 4]>,
}

impl ModifierSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single modifier
    pub fn single(modifier: Modifier) -> Self {
        let mut set = Self::new();
        set.insert(modifier);
        set
    }

    /// Build the set reported by a raw event's indicator flags
    pub fn from_flags(shift: bool, alt: bool, ctrl: bool, meta: bool) -> Self {
        let mut set = Self::new();
        for (held, modifier) in [
            (shift, Modifier::Shift),
            (alt, Modifier::Alt),
            (ctrl, Modifier::Ctrl),
            (meta, Modifier::Meta),
        ] {
            if held {
                set.insert(modifier);
            }
        }
        set
    }

    /// Insert a modifier; returns false if it was already present
    pub fn insert(&mut self, modifier: Modifier) -> bool {
        match self.mods.binary_search(&modifier) {
            Ok(_) => false,
            Err(pos) => {
                self.mods.insert(pos, modifier);
                true
            }
        }
    }

    /// Check if a modifier is present
    pub fn contains(&self, modifier: Modifier) -> bool {
        self.mods.binary_search(&modifier).is_ok()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Iterate modifiers in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.mods.iter().copied()
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = Self::new();
        for modifier in iter {
            set.insert(modifier);
        }
        set
    }
}

impl fmt::Display for ModifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.mods.iter().map(|m| m.key_name()).collect();
        write!(f, "{}", names.join("+"))
    }
}
