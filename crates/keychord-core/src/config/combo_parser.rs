// Keychord Combo String Parser
// Parses combo strings like "mod+shift+k" or "g i" into key descriptors

use crate::combo::{normalize_combo_text, sequence_steps, KeyDescriptor};
use crate::key::{default_primary_modifier, is_special_key_name, resolve_alias, shift_base};
use crate::modifier::{Modifier, ModifierSet};
use crate::Action;

/// Result of parsing a full combo string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCombination {
    /// A single chord such as "ctrl+s"
    Single(KeyDescriptor),
    /// Space-separated chords that must be typed in order, such as "g i"
    Sequence(Vec<KeyDescriptor>),
}

impl ParsedCombination {
    /// All descriptors in typing order
    pub fn steps(&self) -> &[KeyDescriptor] {
        match self {
            ParsedCombination::Single(desc) => std::slice::from_ref(desc),
            ParsedCombination::Sequence(steps) => steps,
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ParsedCombination::Sequence(_))
    }
}

/// Parse a combo string using the platform's primary modifier for `mod`
///
/// Returns `None` only for blank input. Everything else parses: unknown
/// tokens become literal keys.
///
/// # Examples
/// ```
/// use keychord_core::config::parse;
/// use keychord_core::Action;
/// let parsed = parse("g i", None).unwrap();
/// assert!(parsed.is_sequence());
/// assert_eq!(parsed.steps()[1].key, "i");
/// assert_eq!(parsed.steps()[1].action, Action::Press);
/// ```
pub fn parse(text: &str, action: Option<Action>) -> Option<ParsedCombination> {
    parse_with(text, action, default_primary_modifier())
}

/// Parse a combo string with an explicit primary modifier
pub fn parse_with(
    text: &str,
    action: Option<Action>,
    primary: Modifier,
) -> Option<ParsedCombination> {
    let label = normalize_combo_text(text);
    let steps = sequence_steps(&label);
    match steps.as_slice() {
        [] => None,
        [single] => parse_combo_with(single, action, primary).map(ParsedCombination::Single),
        many => {
            let descriptors: Option<Vec<_>> = many
                .iter()
                .map(|step| parse_combo_with(step, action, primary))
                .collect();
            descriptors.map(ParsedCombination::Sequence)
        }
    }
}

/// Parse one chord (no whitespace) into a key descriptor
///
/// # Examples
/// ```
/// use keychord_core::config::parse_combo;
/// use keychord_core::{Action, Modifier};
/// let desc = parse_combo("ctrl+shift+k", None).unwrap();
/// assert_eq!(desc.key, "k");
/// assert!(desc.modifiers.contains(Modifier::Ctrl));
/// assert_eq!(desc.action, Action::Down);
/// ```
pub fn parse_combo(combo: &str, action: Option<Action>) -> Option<KeyDescriptor> {
    parse_combo_with(combo, action, default_primary_modifier())
}

/// Parse one chord with an explicit primary modifier
pub fn parse_combo_with(
    combo: &str,
    action: Option<Action>,
    primary: Modifier,
) -> Option<KeyDescriptor> {
    let mut modifiers = ModifierSet::new();
    let mut trigger: Option<String> = None;
    let mut last_token: Option<String> = None;

    for token in split_keys(combo) {
        if token.is_empty() {
            continue;
        }

        let mut key = resolve_alias(&token, primary)
            .map(str::to_string)
            .unwrap_or(token);

        // Shifted characters only make sense for phases that report the
        // physical key, so rewrite "?" as shift+"/" for those.
        if matches!(action, Some(a) if !a.is_character()) {
            if let Some(base) = shift_base(&key) {
                key = base.to_string();
                modifiers.insert(Modifier::Shift);
            }
        }

        match Modifier::from_key_name(&key) {
            Some(modifier) => {
                modifiers.insert(modifier);
            }
            None => trigger = Some(key.clone()),
        }
        last_token = Some(key);
    }

    // A chord made only of modifiers ("shift") triggers on that modifier key
    let key = trigger.or(last_token)?;
    let action = pick_best_action(&key, &modifiers, action);
    Some(KeyDescriptor {
        key,
        modifiers,
        action,
    })
}

/// Split a chord on `+`, keeping a literal plus key distinguishable
fn split_keys(combo: &str) -> Vec<String> {
    if combo == "+" {
        return vec!["+".to_string()];
    }
    combo
        .replace("++", "+plus")
        .split('+')
        .map(str::to_string)
        .collect()
}

/// Choose the event phase for a key when none was given
///
/// Keys that only exist in the non-printable table never produce a
/// keypress, so they default to keydown. Keypress also cannot report
/// modifiers, so any modifier forces keydown.
fn pick_best_action(key: &str, modifiers: &ModifierSet, action: Option<Action>) -> Action {
    let action = action.unwrap_or_else(|| {
        if is_special_key_name(key) {
            Action::Down
        } else {
            Action::Press
        }
    });

    if action.is_character() && !modifiers.is_empty() {
        return Action::Down;
    }
    action
}
