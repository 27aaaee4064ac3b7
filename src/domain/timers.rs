// Simulated time: a pausable clock and a cancellable timer queue.

use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct PendingTimer<K> {
    id: TimerId,
    due: Duration,
    key: K,
}

/// Timers keyed by `K`, fired in due order as simulated time advances.
#[derive(Debug)]
pub struct TimerQueue<K> {
    now: Duration,
    next_id: u64,
    pending: Vec<PendingTimer<K>>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 1,
            pending: Vec::new(),
        }
    }

    pub fn schedule(&mut self, delay: Duration, key: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingTimer {
            id,
            due: self.now + delay,
            key,
        });
        id
    }

    /// Removes a pending timer. Returns its key if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<K> {
        let index = self.pending.iter().position(|t| t.id == id)?;
        Some(self.pending.swap_remove(index).key)
    }

    /// Moves time forward and returns the keys of every timer that came due,
    /// earliest first (ties in scheduling order).
    pub fn advance(&mut self, dt: Duration) -> Vec<K> {
        self.now += dt;
        let now = self.now;

        let mut due = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].due <= now {
                due.push(self.pending.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|t| (t.due, t.id));
        due.into_iter().map(|t| t.key).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Why simulated time is currently stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PauseReason {
    UpgradeRound,
    GameOver,
}

/// Session clock; time only flows while no pause reason is held.
#[derive(Debug, Default)]
pub struct SimClock {
    paused_by: BTreeSet<PauseReason>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the reason was already holding the clock.
    pub fn pause(&mut self, reason: PauseReason) -> bool {
        self.paused_by.insert(reason)
    }

    pub fn resume(&mut self, reason: PauseReason) -> bool {
        self.paused_by.remove(&reason)
    }

    pub fn is_running(&self) -> bool {
        self.paused_by.is_empty()
    }

    pub fn time_scale(&self) -> f32 {
        if self.is_running() { 1.0 } else { 0.0 }
    }

    /// Wall-clock step converted to simulated time.
    pub fn tick(&mut self, dt: Duration) -> Duration {
        if self.is_running() { dt } else { Duration::ZERO }
    }
}
