// Keychord Sequence Progress
// Per-engine progress through multi-key sequences, with deadline-based timers

use std::collections::HashSet;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::Action;

/// Default inactivity window between two keys of a sequence
pub const DEFAULT_SEQUENCE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default delay before the full reset that follows a completed sequence
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(10);

/// Tracks how far each registered sequence has progressed
///
/// Timers are deadlines rather than callbacks: nothing fires on its own,
/// the owner calls [`SequenceProgress::expire`] with the current time
/// before handling an event (and whenever it polls between events).
#[derive(Debug, Clone)]
pub struct SequenceProgress {
    levels: IndexMap<String, usize>,
    expected_next: Option<Action>,
    suppress_next_up: Option<String>,
    ignore_next_press: bool,
    /// Inactivity reset; replaced on every advancing key, never doubled
    reset_deadline: Option<Instant>,
    /// Post-completion resets, fire and forget
    settle_deadlines: SmallVec<[Instant; 2]>,
    timeout: Duration,
    settle_delay: Duration,
}

impl SequenceProgress {
    /// Create empty progress with the given inactivity timeout and settle delay
    pub fn new(timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            levels: IndexMap::new(),
            expected_next: None,
            suppress_next_up: None,
            ignore_next_press: false,
            reset_deadline: None,
            settle_deadlines: SmallVec::new(),
            timeout,
            settle_delay,
        }
    }

    /// Start tracking a sequence at level 0
    pub fn register(&mut self, label: &str) {
        self.levels.insert(label.to_string(), 0);
    }

    /// Current level of a sequence (0 when unknown)
    pub fn level(&self, label: &str) -> usize {
        self.levels.get(label).copied().unwrap_or(0)
    }

    /// Action the next key of an in-progress sequence must use
    pub fn expected_next(&self) -> Option<Action> {
        self.expected_next
    }

    /// Whether any sequence is past its first key
    pub fn is_in_progress(&self) -> bool {
        self.levels.values().any(|level| *level > 0)
    }

    /// Record a matched intermediate key: the sequence moves one level up,
    /// waits for `next_action` and the inactivity timer restarts
    pub fn advance(&mut self, label: &str, next_action: Action, now: Instant) {
        self.expected_next = Some(next_action);
        let level = self.levels.entry(label.to_string()).or_insert(0);
        *level += 1;
        // A timeout past the clock's range never fires
        self.reset_deadline = now.checked_add(self.timeout);
        log::debug!(
            "sequence '{}' advanced to level {}, expecting {}",
            label,
            level,
            next_action
        );
    }

    /// Record a completed sequence; all progress resets after the settle
    /// delay so a final key that also starts another sequence is not lost
    pub fn complete(&mut self, label: &str, now: Instant) {
        if let Some(deadline) = now.checked_add(self.settle_delay) {
            self.settle_deadlines.push(deadline);
        }
        log::debug!("sequence '{}' completed", label);
    }

    /// Ignore the next keyup for `character`
    pub fn suppress_next_up(&mut self, character: &str) {
        self.suppress_next_up = Some(character.to_string());
    }

    /// Consume a pending keyup suppression if it is for `character`
    ///
    /// Compares the full canonical key, so keys like "0" are matched like
    /// any other.
    pub fn take_suppressed_up(&mut self, character: &str) -> bool {
        if self.suppress_next_up.as_deref() == Some(character) {
            self.suppress_next_up = None;
            return true;
        }
        false
    }

    pub fn ignore_next_press(&self) -> bool {
        self.ignore_next_press
    }

    pub fn set_ignore_next_press(&mut self, ignore: bool) {
        self.ignore_next_press = ignore;
    }

    /// Reset every sequence to level 0 except the ones in `keep`
    ///
    /// The expected action is cleared when nothing was kept.
    pub fn reset_except(&mut self, keep: &HashSet<String>) {
        let mut active = false;
        for (label, level) in self.levels.iter_mut() {
            if keep.contains(label) {
                active = true;
                continue;
            }
            *level = 0;
        }
        if !active {
            self.expected_next = None;
        }
    }

    /// Reset every sequence to level 0
    pub fn reset_all(&mut self) {
        self.reset_except(&HashSet::new());
    }

    /// Fire every timer that is due at `now`; returns true if any fired
    pub fn expire(&mut self, now: Instant) -> bool {
        let mut fired = false;

        if self.reset_deadline.is_some_and(|deadline| deadline <= now) {
            self.reset_deadline = None;
            log::debug!("sequence timeout elapsed, resetting progress");
            fired = true;
        }

        let pending = self.settle_deadlines.len();
        self.settle_deadlines.retain(|deadline| *deadline > now);
        if self.settle_deadlines.len() != pending {
            fired = true;
        }

        if fired {
            self.reset_all();
        }
        fired
    }

    /// Earliest pending timer, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.settle_deadlines
            .iter()
            .copied()
            .chain(self.reset_deadline)
            .min()
    }

    /// Forget all sequences and transient state
    pub fn clear(&mut self) {
        self.levels.clear();
        self.expected_next = None;
        self.suppress_next_up = None;
        self.ignore_next_press = false;
        self.reset_deadline = None;
        self.settle_deadlines.clear();
    }
}

impl Default for SequenceProgress {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_TIMEOUT, DEFAULT_SETTLE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(labels: &[&str]) -> HashSet<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_and_level() {
        let mut progress = SequenceProgress::default();
        progress.register("g i");
        assert_eq!(progress.level("g i"), 0);
        assert_eq!(progress.level("unknown"), 0);
        assert!(!progress.is_in_progress());
    }

    #[test]
    fn test_advance_sets_expectation_and_timer() {
        let mut progress = SequenceProgress::default();
        let now = Instant::now();
        progress.register("g i");
        progress.advance("g i", Action::Press, now);

        assert_eq!(progress.level("g i"), 1);
        assert_eq!(progress.expected_next(), Some(Action::Press));
        assert_eq!(progress.next_deadline(), Some(now + DEFAULT_SEQUENCE_TIMEOUT));
        assert!(progress.is_in_progress());
    }

    #[test]
    fn test_advance_replaces_timer() {
        let mut progress = SequenceProgress::default();
        let start = Instant::now();
        progress.register("a b c");
        progress.advance("a b c", Action::Press, start);
        progress.advance("a b c", Action::Press, start + Duration::from_millis(800));

        // The first deadline must not fire
        assert!(!progress.expire(start + Duration::from_millis(1200)));
        assert_eq!(progress.level("a b c"), 2);
        assert!(progress.expire(start + Duration::from_millis(1800)));
        assert_eq!(progress.level("a b c"), 0);
    }

    #[test]
    fn test_timeout_resets_everything() {
        let mut progress = SequenceProgress::default();
        let now = Instant::now();
        progress.register("g i");
        progress.advance("g i", Action::Press, now);

        assert!(!progress.expire(now + Duration::from_millis(999)));
        assert!(progress.expire(now + Duration::from_millis(1000)));
        assert_eq!(progress.level("g i"), 0);
        assert_eq!(progress.expected_next(), None);
        assert_eq!(progress.next_deadline(), None);
    }

    #[test]
    fn test_reset_except_keeps_matched() {
        let mut progress = SequenceProgress::default();
        let now = Instant::now();
        progress.register("g i");
        progress.register("g t");
        progress.advance("g i", Action::Press, now);
        progress.advance("g t", Action::Press, now);

        progress.reset_except(&keep(&["g t"]));
        assert_eq!(progress.level("g i"), 0);
        assert_eq!(progress.level("g t"), 1);
        assert_eq!(progress.expected_next(), Some(Action::Press));

        progress.reset_except(&keep(&[]));
        assert_eq!(progress.level("g t"), 0);
        assert_eq!(progress.expected_next(), None);
    }

    #[test]
    fn test_complete_schedules_settle_reset() {
        let mut progress = SequenceProgress::default();
        let now = Instant::now();
        progress.register("g i");
        progress.advance("g i", Action::Press, now);
        progress.complete("g i", now);

        assert!(!progress.expire(now + Duration::from_millis(5)));
        assert_eq!(progress.level("g i"), 1);
        assert!(progress.expire(now + DEFAULT_SETTLE_DELAY));
        assert_eq!(progress.level("g i"), 0);
    }

    #[test]
    fn test_unbounded_durations_never_expire() {
        let mut progress = SequenceProgress::new(Duration::MAX, Duration::MAX);
        let now = Instant::now();
        progress.register("g i");
        progress.advance("g i", Action::Press, now);

        assert_eq!(progress.next_deadline(), None);
        assert!(!progress.expire(now + Duration::from_secs(3600)));
        assert_eq!(progress.level("g i"), 1);

        progress.complete("g i", now);
        assert_eq!(progress.next_deadline(), None);
        assert_eq!(progress.level("g i"), 1);
    }

    #[test]
    fn test_take_suppressed_up() {
        let mut progress = SequenceProgress::default();
        progress.suppress_next_up("0");

        assert!(!progress.take_suppressed_up("1"));
        assert!(progress.take_suppressed_up("0"));
        // Consumed
        assert!(!progress.take_suppressed_up("0"));
    }

    #[test]
    fn test_clear() {
        let mut progress = SequenceProgress::default();
        let now = Instant::now();
        progress.register("g i");
        progress.advance("g i", Action::Press, now);
        progress.suppress_next_up("i");
        progress.set_ignore_next_press(true);

        progress.clear();
        assert_eq!(progress.level("g i"), 0);
        assert_eq!(progress.expected_next(), None);
        assert!(!progress.ignore_next_press());
        assert!(!progress.take_suppressed_up("i"));
        assert_eq!(progress.next_deadline(), None);
    }
}
