// Keychord Dispatch - Candidate Matching
// Filters a key's bindings against an event and applies the sequence tie-break

use crate::input::KeyEvent;
use crate::mapping::{Binding, BindingRegistry};
use crate::modifier::{Modifier, ModifierSet};
use crate::state::SequenceProgress;

/// Modifiers an event is matched with
///
/// Releasing a modifier key reports that modifier as the only one held, so
/// "shift" bound on keyup fires however the flags were reported.
pub fn effective_modifiers(character: &str, event: &KeyEvent, reported: ModifierSet) -> ModifierSet {
    if event.action.is_up() {
        if let Some(modifier) = Modifier::from_key_name(character) {
            return ModifierSet::single(modifier);
        }
    }
    reported
}

/// Collect every binding registered under `character` that matches the event
///
/// A binding matches when:
/// - it is a plain combo, or a sequence link whose level equals the
///   sequence's current progress
/// - its action equals the event's action
/// - its modifiers equal `modifiers`, except for keypress events without
///   ctrl or meta, where modifiers are not compared at all
///
/// Matches keep registry order, so sequence links come first.
pub fn find_matches(
    registry: &BindingRegistry,
    progress: &SequenceProgress,
    character: &str,
    modifiers: &ModifierSet,
    event: &KeyEvent,
) -> Vec<Binding> {
    let skip_modifiers = event.action.is_character() && !event.ctrl && !event.meta;

    registry
        .bindings_for(character)
        .iter()
        .filter(|binding| match binding.sequence() {
            Some(link) => progress.level(&link.id) == link.level,
            None => true,
        })
        .filter(|binding| binding.action == event.action)
        .filter(|binding| skip_modifiers || &binding.modifiers == modifiers)
        .cloned()
        .collect()
}

/// Deepest level among the matching sequence links, if any matched
///
/// Only links at this level fire; shallower sequences lose the event.
pub fn max_sequence_level(matches: &[Binding]) -> Option<usize> {
    matches.iter().filter_map(Binding::level).max()
}
