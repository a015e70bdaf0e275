// Keychord Core Library
// Keyboard shortcut bindings, multi-key sequences and event resolution

pub mod action;
pub mod combo;
pub mod config;
pub mod dispatch;
pub mod input;
pub mod key;
pub mod mapping;
pub mod modifier;
pub mod state;

pub use action::{Action, ActionParseError};
pub use combo::KeyDescriptor;
pub use config::{parse, parse_combo, BindEntry, Config, ConfigError, ParsedCombination};
pub use dispatch::{Dispatch, Engine, EngineOptions};
pub use input::{DefaultPolicy, Element, KeyEvent, SuppressionContext, SuppressionPolicy};
pub use key::add_keycodes;
pub use mapping::{
    into_callback, Binding, BindingRegistry, BindingTarget, Callback, Invocation, LinkStep,
    Propagation, SequenceRef,
};
pub use modifier::{Modifier, ModifierSet};
pub use state::SequenceProgress;
