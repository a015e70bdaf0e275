// Keychord Config Parser - TOML with Serde
// Loads engine options, extra key codes and bindings from a TOML file

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::action::ActionParseError;
use crate::dispatch::{Engine, EngineOptions};
use crate::key::default_primary_modifier;
use crate::mapping::{into_callback, Callback, Invocation, Propagation};
use crate::modifier::Modifier;
use crate::state::{DEFAULT_SEQUENCE_TIMEOUT, DEFAULT_SETTLE_DELAY};
use crate::Action;

/// Accepted range for `sequence_timeout_ms`
const SEQUENCE_TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=60_000;

/// Accepted range for `settle_delay_ms`
const SETTLE_DELAY_RANGE: std::ops::RangeInclusive<u64> = 0..=1_000;

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid action: {0}")]
    InvalidAction(#[from] ActionParseError),

    #[error("Invalid keycode: {0}")]
    InvalidKeycode(String),

    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),

    #[error("Timeout value out of range: {0}")]
    TimeoutOutOfRange(String),
}

/// Root TOML table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    #[serde(default)]
    engine: Option<EngineToml>,

    /// Extra non-printable keys: code (as a string key) to name
    #[serde(default)]
    keycodes: BTreeMap<String, String>,

    #[serde(default)]
    bind: Vec<BindToml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineToml {
    #[serde(default)]
    sequence_timeout_ms: Option<u64>,
    #[serde(default)]
    settle_delay_ms: Option<u64>,
    #[serde(default)]
    opt_in_class: Option<String>,
    #[serde(default)]
    primary_modifier: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct BindToml {
    keys: KeysToml,
    #[serde(default)]
    action: Option<String>,
    command: String,
    #[serde(default)]
    prevent_default: bool,
}

/// `keys = "g i"` or `keys = ["g i", "g t"]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeysToml {
    One(String),
    Many(Vec<String>),
}

impl KeysToml {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeysToml::One(combo) => vec![combo],
            KeysToml::Many(combos) => combos,
        }
    }
}

/// One `[[bind]]` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindEntry {
    /// Combos or sequences sharing the command
    pub keys: Vec<String>,
    /// Explicit action, inferred per key when absent
    pub action: Option<Action>,
    /// Name the host resolves to a callback
    pub command: String,
    /// Stop the event after the command runs
    pub prevent_default: bool,
}

/// Parsed configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub sequence_timeout: Duration,
    pub settle_delay: Duration,
    pub opt_in_class: Option<String>,
    pub primary_modifier: Modifier,
    /// Extra non-printable keys, in ascending code order
    pub keycodes: Vec<(u32, String)>,
    pub binds: Vec<BindEntry>,
    /// File the config was loaded from
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            opt_in_class: None,
            primary_modifier: default_primary_modifier(),
            keycodes: vec![],
            binds: vec![],
            source_path: None,
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let toml_config: ConfigToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;

        toml_config.into_config()
    }

    /// Parse a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.source_path = Some(path.to_path_buf());
        log::debug!(
            "loaded {} bind entries from {}",
            config.binds.len(),
            path.display()
        );
        Ok(config)
    }

    /// Default config location (~/.config/keychord/config.toml on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keychord").join("config.toml"))
    }

    /// Load the default config file, falling back to defaults when absent
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Engine options described by this config
    pub fn to_engine_options(&self) -> EngineOptions {
        let defaults = EngineOptions::default();
        EngineOptions {
            sequence_timeout: self.sequence_timeout,
            settle_delay: self.settle_delay,
            opt_in_class: self
                .opt_in_class
                .clone()
                .unwrap_or(defaults.opt_in_class),
            primary_modifier: self.primary_modifier,
        }
    }

    /// Register the extra key codes and every bind entry with `engine`
    ///
    /// `commands` resolves a bind entry to its callback; entries it returns
    /// `None` for are skipped with a warning. Returns how many combos were
    /// bound.
    pub fn install<F>(&self, engine: &mut Engine, mut commands: F) -> usize
    where
        F: FnMut(&BindEntry) -> Option<Callback>,
    {
        if !self.keycodes.is_empty() {
            engine.add_keycodes(self.keycodes.iter().cloned());
        }

        let mut bound = 0;
        for entry in &self.binds {
            let Some(callback) = commands(entry) else {
                log::warn!("unknown command '{}', skipping {:?}", entry.command, entry.keys);
                continue;
            };
            let callback = if entry.prevent_default {
                stopping(callback)
            } else {
                callback
            };

            for combo in &entry.keys {
                engine.bind_callback(combo, entry.action, std::sync::Arc::clone(&callback));
                bound += 1;
            }
        }
        bound
    }
}

/// Wrap a callback so the event always stops after it runs
fn stopping(inner: Callback) -> Callback {
    into_callback(move |invocation: &Invocation<'_>| {
        let mut guard = inner.lock();
        let run = &mut *guard;
        run(invocation);
        Propagation::Stop
    })
}

impl ConfigToml {
    /// Convert parsed TOML to the internal Config structure
    fn into_config(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(engine) = self.engine {
            if let Some(ms) = engine.sequence_timeout_ms {
                if !SEQUENCE_TIMEOUT_RANGE.contains(&ms) {
                    return Err(ConfigError::TimeoutOutOfRange(format!(
                        "sequence_timeout_ms must be 1-60000ms, got {}",
                        ms
                    )));
                }
                config.sequence_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = engine.settle_delay_ms {
                if !SETTLE_DELAY_RANGE.contains(&ms) {
                    return Err(ConfigError::TimeoutOutOfRange(format!(
                        "settle_delay_ms must be 0-1000ms, got {}",
                        ms
                    )));
                }
                config.settle_delay = Duration::from_millis(ms);
            }
            config.opt_in_class = engine.opt_in_class;
            if let Some(name) = engine.primary_modifier {
                config.primary_modifier = parse_primary_modifier(&name)?;
            }
        }

        for (code, name) in self.keycodes {
            let parsed = code
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidKeycode(code.clone()))?;
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidKeycode(format!(
                    "{} has an empty name",
                    code
                )));
            }
            config.keycodes.push((parsed, name.trim().to_lowercase()));
        }
        config.keycodes.sort_by_key(|(code, _)| *code);

        for bind in self.bind {
            let action = bind.action.as_deref().map(Action::parse).transpose()?;
            let keys: Vec<String> = bind
                .keys
                .into_vec()
                .into_iter()
                .filter(|combo| {
                    let blank = combo.trim().is_empty();
                    if blank {
                        log::warn!("ignoring blank combo for command '{}'", bind.command);
                    }
                    !blank
                })
                .collect();

            config.binds.push(BindEntry {
                keys,
                action,
                command: bind.command,
                prevent_default: bind.prevent_default,
            });
        }

        Ok(config)
    }
}

/// Only ctrl and meta make sense as the primary modifier
fn parse_primary_modifier(name: &str) -> Result<Modifier, ConfigError> {
    match Modifier::from_key_name(&name.trim().to_lowercase()) {
        Some(modifier @ (Modifier::Ctrl | Modifier::Meta)) => Ok(modifier),
        _ => Err(ConfigError::InvalidModifier(format!(
            "primary_modifier must be ctrl or meta, got '{}'",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyEvent;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.to_engine_options(), EngineOptions::default());
    }

    #[test]
    fn test_config_from_full_toml() {
        let toml = r#"
            [engine]
            sequence_timeout_ms = 1500
            settle_delay_ms = 5
            opt_in_class = "shortcuts"
            primary_modifier = "meta"

            [keycodes]
            250 = "play"
            179 = "MediaPlay"

            [[bind]]
            keys = ["g i", "g t"]
            command = "goto"

            [[bind]]
            keys = "ctrl+s"
            action = "keydown"
            command = "save"
            prevent_default = true
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.sequence_timeout, Duration::from_millis(1500));
        assert_eq!(config.settle_delay, Duration::from_millis(5));
        assert_eq!(config.primary_modifier, Modifier::Meta);
        assert_eq!(
            config.keycodes,
            vec![(179, "mediaplay".to_string()), (250, "play".to_string())]
        );

        assert_eq!(config.binds.len(), 2);
        assert_eq!(config.binds[0].keys, vec!["g i", "g t"]);
        assert_eq!(config.binds[0].action, None);
        assert_eq!(config.binds[1].keys, vec!["ctrl+s"]);
        assert_eq!(config.binds[1].action, Some(Action::Down));
        assert!(config.binds[1].prevent_default);

        let options = config.to_engine_options();
        assert_eq!(options.opt_in_class, "shortcuts");
        assert_eq!(options.sequence_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_short_action_names() {
        let toml = r#"
            [[bind]]
            keys = "x"
            action = "Up"
            command = "noop"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.binds[0].action, Some(Action::Up));
    }

    #[test]
    fn test_invalid_action() {
        let toml = r#"
            [[bind]]
            keys = "x"
            action = "hold"
            command = "noop"
        "#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_invalid_keycode() {
        let toml = r#"
            [keycodes]
            play = "play"
        "#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::InvalidKeycode(_))
        ));
    }

    #[test]
    fn test_timeout_out_of_range() {
        let toml = r#"
            [engine]
            sequence_timeout_ms = 0
        "#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::TimeoutOutOfRange(_))
        ));

        let toml = r#"
            [engine]
            settle_delay_ms = 5000
        "#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::TimeoutOutOfRange(_))
        ));
    }

    #[test]
    fn test_primary_modifier_must_be_ctrl_or_meta() {
        let toml = r#"
            [engine]
            primary_modifier = "shift"
        "#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::InvalidModifier(_))
        ));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let toml = r#"
            [[bind]]
            keys = "x"
            command = "noop"
            repeat = true
        "#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_blank_keys_dropped() {
        let toml = r#"
            [[bind]]
            keys = ["a", "  "]
            command = "noop"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.binds[0].keys, vec!["a"]);
    }

    #[test]
    fn test_install_binds_commands() {
        let toml = r#"
            [[bind]]
            keys = ["a", "b"]
            command = "letter"

            [[bind]]
            keys = "ctrl+s"
            command = "save"
            prevent_default = true

            [[bind]]
            keys = "z"
            command = "missing"
        "#;
        let config = Config::from_toml(toml).unwrap();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();

        let mut engine = Engine::new();
        let bound = config.install(&mut engine, |entry| {
            if entry.command == "missing" {
                return None;
            }
            let log = Arc::clone(&log);
            let command = entry.command.clone();
            Some(into_callback(move |_: &Invocation<'_>| {
                log.lock().push(command.clone())
            }))
        });
        assert_eq!(bound, 3);

        let now = Instant::now();
        let dispatch = engine.handle_at(&KeyEvent::press_char('b'), now);
        assert!(!dispatch.prevent_default);

        let dispatch = engine.handle_at(&KeyEvent::down(83).with_ctrl(), now);
        assert!(dispatch.prevent_default && dispatch.stop_propagation);

        engine.handle_at(&KeyEvent::press_char('z'), now);
        assert_eq!(*log.lock(), vec!["letter", "save"]);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "keychord-config-test-{}.toml",
            std::process::id()
        ));
        fs::write(&path, "[engine]\nsequence_timeout_ms = 250\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.sequence_timeout, Duration::from_millis(250));
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));

        fs::remove_file(&path).unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Io(_))
        ));
    }
}
