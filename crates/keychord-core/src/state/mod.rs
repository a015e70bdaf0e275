// Keychord State
// Mutable per-engine state

pub mod sequence;

pub use sequence::{SequenceProgress, DEFAULT_SEQUENCE_TIMEOUT, DEFAULT_SETTLE_DELAY};
