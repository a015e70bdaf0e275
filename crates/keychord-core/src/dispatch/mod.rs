// Keychord Dispatch
// Event resolution: candidate matching and the engine that fires callbacks

pub mod engine;
pub mod matcher;

pub use engine::{Dispatch, Engine, EngineOptions, DEFAULT_OPT_IN_CLASS};
pub use matcher::{effective_modifiers, find_matches, max_sequence_level};
