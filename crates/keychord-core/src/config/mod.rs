// Keychord Config API
// Combo string parsing and the TOML configuration file

pub mod combo_parser;
pub mod parser;

pub use combo_parser::{parse, parse_combo, parse_combo_with, parse_with, ParsedCombination};
pub use parser::{BindEntry, Config, ConfigError};
