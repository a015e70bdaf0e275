// Keychord Key Descriptor Tables
// Raw key codes to canonical key names, shift equivalences and aliases

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::{Mutex, RwLock};

use crate::modifier::Modifier;

/// Global table of non-printable keys, extendable through [`add_keycodes`]
static SPECIAL_KEYS: LazyLock<RwLock<SpecialKeyTable>> =
    LazyLock::new(|| RwLock::new(SpecialKeyTable::with_defaults()));

/// Reverse index of [`SPECIAL_KEYS`], rebuilt when the table generation moves
static REVERSE_CACHE: LazyLock<Mutex<ReverseCache>> =
    LazyLock::new(|| Mutex::new(ReverseCache::default()));

/// Key codes produced by the numeric keypad digits. They are reachable from
/// character-producing events, so they are left out of the reverse index.
const NUMPAD_CODES: std::ops::RangeInclusive<u32> = 96..=111;

/// Punctuation reported by keydown/keyup under codes that differ from the
/// character code.
const PUNCTUATION_KEYS: &[(u32, &str)] = &[
    (106, "*"),
    (107, "+"),
    (109, "-"),
    (110, "."),
    (111, "/"),
    (186, ";"),
    (187, "="),
    (188, ","),
    (189, "-"),
    (190, "."),
    (191, "/"),
    (192, "`"),
    (219, "["),
    (220, "\\"),
    (221, "]"),
    (222, "'"),
];

/// Shifted character to the unshifted key that produces it (US layout)
const SHIFT_KEYS: &[(&str, &str)] = &[
    ("~", "`"),
    ("!", "1"),
    ("@", "2"),
    ("#", "3"),
    ("$", "4"),
    ("%", "5"),
    ("^", "6"),
    ("&", "7"),
    ("*", "8"),
    ("(", "9"),
    (")", "0"),
    ("_", "-"),
    ("+", "="),
    (":", ";"),
    ("\"", "'"),
    ("<", ","),
    (">", "."),
    ("?", "/"),
    ("|", "\\"),
];

/// Human-friendly names accepted in combo strings. `mod` is resolved
/// separately because it depends on the platform's primary modifier.
const ALIASES: &[(&str, &str)] = &[
    ("option", "alt"),
    ("command", "meta"),
    ("return", "enter"),
    ("escape", "esc"),
    ("plus", "+"),
];

/// The vendor-neutral alias for the primary modifier
pub const PRIMARY_ALIAS: &str = "mod";

struct SpecialKeyTable {
    names: HashMap<u32, String>,
    generation: u64,
}

impl SpecialKeyTable {
    fn with_defaults() -> Self {
        let mut names: HashMap<u32, String> = [
            (8, "backspace"),
            (9, "tab"),
            (13, "enter"),
            (16, "shift"),
            (17, "ctrl"),
            (18, "alt"),
            (20, "capslock"),
            (27, "esc"),
            (32, "space"),
            (33, "pageup"),
            (34, "pagedown"),
            (35, "end"),
            (36, "home"),
            (37, "left"),
            (38, "up"),
            (39, "right"),
            (40, "down"),
            (45, "ins"),
            (46, "del"),
            (91, "meta"),
            (93, "meta"),
            (224, "meta"),
        ]
        .into_iter()
        .map(|(code, name)| (code, name.to_string()))
        .collect();

        // Function keys F1-F19
        for i in 1..20u32 {
            names.insert(111 + i, format!("f{}", i));
        }

        // Numeric keypad digits
        for i in 0..=9u32 {
            names.insert(96 + i, i.to_string());
        }

        Self {
            names,
            generation: 1,
        }
    }
}

/// Name -> code index over the non-printable key table
///
/// `built_for` records the table generation the index was computed from;
/// the index is stale whenever it differs from the live generation.
#[derive(Debug, Default)]
struct ReverseCache {
    built_for: u64,
    codes: HashMap<String, u32>,
}

impl ReverseCache {
    fn refresh(&mut self, table: &SpecialKeyTable) {
        if self.built_for == table.generation {
            return;
        }
        self.codes = table
            .names
            .iter()
            .filter(|(code, _)| !NUMPAD_CODES.contains(code))
            .map(|(code, name)| (name.clone(), *code))
            .collect();
        self.built_for = table.generation;
        log::trace!("rebuilt reverse key index for generation {}", table.generation);
    }
}

/// Look up the canonical name of a non-printable key code
pub fn special_key_name(code: u32) -> Option<String> {
    SPECIAL_KEYS.read().names.get(&code).cloned()
}

/// Look up punctuation reported under a keydown/keyup code
pub fn punctuation_key_name(code: u32) -> Option<&'static str> {
    PUNCTUATION_KEYS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Get the unshifted base key for a shifted character, e.g. `"?"` -> `"/"`
pub fn shift_base(key: &str) -> Option<&'static str> {
    SHIFT_KEYS
        .iter()
        .find(|(shifted, _)| *shifted == key)
        .map(|(_, base)| *base)
}

/// Resolve a combo token through the alias table
///
/// `primary` is what `mod` stands for on this platform.
pub fn resolve_alias(token: &str, primary: Modifier) -> Option<&'static str> {
    if token == PRIMARY_ALIAS {
        return Some(primary.key_name());
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, name)| *name)
}

/// Check whether a canonical key name is only reachable through the
/// non-printable key table (so it never arrives as a keypress)
pub fn is_special_key_name(name: &str) -> bool {
    special_key_code(name).is_some()
}

/// Reverse lookup: the key code producing a non-printable key name
pub fn special_key_code(name: &str) -> Option<u32> {
    let table = SPECIAL_KEYS.read();
    let mut cache = REVERSE_CACHE.lock();
    cache.refresh(&table);
    cache.codes.get(name).copied()
}

/// Merge extra entries into the non-printable key table
///
/// Existing codes are overwritten. Every call moves the table generation,
/// which invalidates the reverse index.
pub fn add_keycodes<I, S>(entries: I)
where
    I: IntoIterator<Item = (u32, S)>,
    S: Into<String>,
{
    let mut table = SPECIAL_KEYS.write();
    let mut added = 0usize;
    for (code, name) in entries {
        table.names.insert(code, name.into());
        added += 1;
    }
    table.generation += 1;
    log::debug!(
        "added {} keycode(s), key table generation is now {}",
        added,
        table.generation
    );
}

/// Current generation of the non-printable key table
pub fn table_generation() -> u64 {
    SPECIAL_KEYS.read().generation
}

/// Platform default for the `mod` alias
pub fn default_primary_modifier() -> Modifier {
    if cfg!(any(target_os = "macos", target_os = "ios")) {
        Modifier::Meta
    } else {
        Modifier::Ctrl
    }
}
