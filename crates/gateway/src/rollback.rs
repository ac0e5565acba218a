//! Advisory head tracking for rollback detection.
//!
//! `last_known` only ever informs logging and read-binding; a stale write
//! under concurrency is acceptable, so plain swap semantics are enough.

use std::sync::atomic::{AtomicU64, Ordering};

/// What a head observation revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackKind {
    /// Head moved forward or stood still.
    None,
    /// Head moved back by less than the configured confirmation window.
    Filtered { gap: u64 },
    /// Head moved back past the confirmation window.
    Compromising { gap: u64 },
}

/// Last observed head of the backend chain.
#[derive(Debug, Default)]
pub struct RollbackState {
    last_known: AtomicU64,
}

impl RollbackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_known(&self) -> u64 {
        self.last_known.load(Ordering::Relaxed)
    }

    /// Record a fresh head observation and classify it.
    ///
    /// `window` is the confirmation depth: a decrease of at least `window`
    /// is compromising, anything smaller is filtered noise. A zero window
    /// has no filtered band, so every rollback is compromising. The state
    /// always resets to the observed head.
    pub fn observe(&self, current: u64, window: u64) -> RollbackKind {
        let previous = self.last_known.swap(current, Ordering::Relaxed);
        if current >= previous {
            return RollbackKind::None;
        }
        let gap = previous - current;
        if gap >= window {
            RollbackKind::Compromising { gap }
        } else {
            RollbackKind::Filtered { gap }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_motion_is_silent() {
        let state = RollbackState::new();
        assert_eq!(state.observe(100, 12), RollbackKind::None);
        assert_eq!(state.observe(100, 12), RollbackKind::None);
        assert_eq!(state.observe(105, 12), RollbackKind::None);
        assert_eq!(state.last_known(), 105);
    }

    #[test]
    fn small_rollback_is_filtered_large_is_compromising() {
        let state = RollbackState::new();
        state.observe(100, 12);
        // gap 5 < 12
        assert_eq!(state.observe(95, 12), RollbackKind::Filtered { gap: 5 });
        assert_eq!(state.last_known(), 95);
        // gap 15 >= 12
        assert_eq!(state.observe(80, 12), RollbackKind::Compromising { gap: 15 });
        assert_eq!(state.last_known(), 80);
    }

    #[test]
    fn zero_window_treats_any_rollback_as_compromising() {
        let state = RollbackState::new();
        state.observe(100, 0);
        assert_eq!(state.observe(99, 0), RollbackKind::Compromising { gap: 1 });
        assert_eq!(state.observe(10, 0), RollbackKind::Compromising { gap: 89 });
    }
}
