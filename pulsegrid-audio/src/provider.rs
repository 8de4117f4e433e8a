//! Pattern providers.

use std::sync::{Arc, RwLock};

use pulsegrid_types::PatternSnapshot;

use crate::PatternProvider;

impl PatternProvider for Arc<PatternSnapshot> {
    fn snapshot(&self) -> Arc<PatternSnapshot> {
        Arc::clone(self)
    }
}

impl PatternProvider for PatternSnapshot {
    fn snapshot(&self) -> Arc<PatternSnapshot> {
        Arc::new(self.clone())
    }
}

/// Editable pattern shared between an editor and the scheduler.
///
/// Writers publish whole snapshots; the scheduler only ever sees complete,
/// immutable versions. Clones share the same pattern.
#[derive(Debug, Clone, Default)]
pub struct SharedPattern {
    current: Arc<RwLock<Arc<PatternSnapshot>>>,
}

impl SharedPattern {
    pub fn new(pattern: PatternSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(pattern))),
        }
    }

    /// Publish a new pattern.
    pub fn replace(&self, pattern: PatternSnapshot) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(pattern);
    }

    /// Copy the current pattern, edit it, publish the result.
    pub fn update<F: FnOnce(&mut PatternSnapshot)>(&self, edit: F) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = PatternSnapshot::clone(&current);
        edit(&mut next);
        *current = Arc::new(next);
    }

    pub fn set_tempo(&self, tempo: f64) {
        self.update(|p| p.tempo = tempo);
    }
}

impl PatternProvider for SharedPattern {
    fn snapshot(&self) -> Arc<PatternSnapshot> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_snapshots_are_unaffected_by_updates() {
        let shared = SharedPattern::new(PatternSnapshot::new(120.0));
        let before = shared.snapshot();
        shared.set_tempo(90.0);
        assert_eq!(before.tempo, 120.0);
        assert_eq!(shared.snapshot().tempo, 90.0);
    }

    #[test]
    fn clones_see_replacements() {
        let shared = SharedPattern::new(PatternSnapshot::new(120.0));
        let reader = shared.clone();
        shared.replace(PatternSnapshot::new(100.0).with_swing(30.0));
        let seen = reader.snapshot();
        assert_eq!(seen.tempo, 100.0);
        assert_eq!(seen.swing_percent, 30.0);
    }
}
