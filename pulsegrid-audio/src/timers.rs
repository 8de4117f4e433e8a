//! Registry of cancellable one-shot timers.
//!
//! Every delayed piece of scheduler work (the next lookahead wake-up, UI step
//! notifications, volume-override reversal) lives here until it fires or is
//! cancelled. Cancelling removes the entry; a cancelled timer can never fire.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use pulsegrid_types::{InstrumentRef, TrackId};

/// Handle returned by [`TimerQueue::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum TimerAction {
    /// Wake the lookahead loop.
    Tick,
    /// Tell the UI the playhead reached `step`.
    StepChanged(usize),
    /// Revert a per-step volume override.
    RestoreVolume {
        track: TrackId,
        instrument: InstrumentRef,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    pub id: TimerId,
    /// Audio-clock seconds.
    pub due: f64,
    pub action: TimerAction,
}

/// Orders by due time, then by arm order.
#[derive(Debug, Clone, Copy)]
struct Key {
    due: f64,
    id: TimerId,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .total_cmp(&other.due)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    by_due: BTreeMap<Key, TimerAction>,
    due_of: HashMap<TimerId, f64>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, due: f64, action: TimerAction) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.by_due.insert(Key { due, id }, action);
        self.due_of.insert(id, due);
        id
    }

    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.due_of.remove(&id) {
            Some(due) => self.by_due.remove(&Key { due, id }).is_some(),
            None => false,
        }
    }

    /// Cancel everything. Returns how many timers were outstanding.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.by_due.len();
        self.by_due.clear();
        self.due_of.clear();
        n
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<Timer> {
        let (&key, _) = self.by_due.iter().next()?;
        if key.due > now {
            return None;
        }
        let action = self.by_due.remove(&key)?;
        self.due_of.remove(&key.id);
        Some(Timer {
            id: key.id,
            due: key.due,
            action,
        })
    }

    /// Earliest due time, if anything is armed.
    pub fn next_due(&self) -> Option<f64> {
        self.by_due.keys().next().map(|k| k.due)
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.due_of.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_due.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimerId, &TimerAction)> {
        self.by_due.iter().map(|(k, a)| (k.id, a))
    }
}
