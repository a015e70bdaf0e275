// Keychord Input Layer - Raw Key Events
// The event descriptor delivered by the host and its canonical character

use std::sync::Arc;

use crate::input::Element;
use crate::key::{punctuation_key_name, special_key_name};
use crate::modifier::ModifierSet;
use crate::Action;

/// A raw key event as delivered by the host's event source
///
/// `code` is the platform key code for keydown/keyup and the produced
/// character code for keypress.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub code: u32,
    pub action: Action,
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    /// Element the event originated from, if the host tracks one
    pub target: Option<Arc<Element>>,
}

impl KeyEvent {
    /// Create an event with no modifiers held
    pub fn new(code: u32, action: Action) -> Self {
        Self {
            code,
            action,
            shift: false,
            alt: false,
            ctrl: false,
            meta: false,
            target: None,
        }
    }

    pub fn down(code: u32) -> Self {
        Self::new(code, Action::Down)
    }

    pub fn up(code: u32) -> Self {
        Self::new(code, Action::Up)
    }

    pub fn press(code: u32) -> Self {
        Self::new(code, Action::Press)
    }

    /// Keypress event for the character `ch`
    pub fn press_char(ch: char) -> Self {
        Self::press(ch as u32)
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Set the modifier flags from a set
    pub fn with_modifiers(mut self, modifiers: &ModifierSet) -> Self {
        use crate::Modifier;
        self.shift = modifiers.contains(Modifier::Shift);
        self.alt = modifiers.contains(Modifier::Alt);
        self.ctrl = modifiers.contains(Modifier::Ctrl);
        self.meta = modifiers.contains(Modifier::Meta);
        self
    }

    pub fn with_target(mut self, target: Arc<Element>) -> Self {
        self.target = Some(target);
        self
    }

    /// Modifiers reported by the event's indicator flags
    pub fn modifiers(&self) -> ModifierSet {
        ModifierSet::from_flags(self.shift, self.alt, self.ctrl, self.meta)
    }

    /// Resolve the canonical character this event stands for
    ///
    /// Keypress events carry the produced character, lower-cased unless
    /// shift is held. Keydown/keyup go through the non-printable table,
    /// then the punctuation codes, then fall back to the lower-cased
    /// character with that code.
    pub fn canonical_character(&self) -> Option<String> {
        if self.action.is_character() {
            let ch = char::from_u32(self.code)?;
            return Some(if self.shift {
                ch.to_string()
            } else {
                ch.to_lowercase().collect()
            });
        }

        if let Some(name) = special_key_name(self.code) {
            return Some(name);
        }
        if let Some(name) = punctuation_key_name(self.code) {
            return Some(name.to_string());
        }

        // keydown/keyup report letters as upper case whether or not shift
        // is held
        char::from_u32(self.code).map(|ch| ch.to_lowercase().collect())
    }
}
