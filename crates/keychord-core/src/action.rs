// Keychord Action Kind
// The event phase a binding listens for

use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Represents the phase of a key event a binding listens for.
///
/// `Press` is the character-producing phase: it reports the produced
/// character (already shifted) but cannot reliably report modifier state.
/// `Down` and `Up` report the physical key with full modifier flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Action {
    #[strum(to_string = "keypress", serialize = "press")]
    Press,
    #[strum(to_string = "keydown", serialize = "down")]
    Down,
    #[strum(to_string = "keyup", serialize = "up")]
    Up,
}

impl Action {
    /// Returns true for the character-producing phase
    pub fn is_character(self) -> bool {
        matches!(self, Action::Press)
    }

    /// Returns true if this is a DOWN event
    pub fn is_down(self) -> bool {
        matches!(self, Action::Down)
    }

    /// Returns true if this is an UP event
    pub fn is_up(self) -> bool {
        matches!(self, Action::Up)
    }

    /// Parse an action name, mapping failures into [`ActionParseError`]
    pub fn parse(name: &str) -> Result<Self, ActionParseError> {
        Action::from_str(name.trim()).map_err(|_| ActionParseError(name.to_string()))
    }
}

/// Error returned when an action name is not one of keypress/keydown/keyup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}' (expected keypress, keydown or keyup)")]
pub struct ActionParseError(pub String);
