// Keychord Input Layer
// Raw key events and the elements they originate from

mod event;
mod target;

pub use event::KeyEvent;
pub use target::{DefaultPolicy, Element, SuppressionContext, SuppressionPolicy};
