// Out-of-area dwell timers, one per participant.

use crate::domain::participant::ParticipantId;
use crate::domain::timers::{TimerId, TimerQueue};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug)]
pub struct BoundsMonitor {
    timeout: Duration,
    timers: TimerQueue<ParticipantId>,
    outside: HashMap<ParticipantId, TimerId>,
}

impl BoundsMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            timers: TimerQueue::new(),
            outside: HashMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_outside(&self, participant: ParticipantId) -> bool {
        self.outside.contains_key(&participant)
    }

    /// Starts the countdown. Returns false if the participant was already outside.
    pub fn on_left(&mut self, participant: ParticipantId) -> bool {
        if self.is_outside(participant) {
            return false;
        }
        let id = self.timers.schedule(self.timeout, participant);
        self.outside.insert(participant, id);
        true
    }

    /// Cancels the countdown. Returns false if the participant was inside.
    pub fn on_returned(&mut self, participant: ParticipantId) -> bool {
        match self.outside.remove(&participant) {
            Some(id) => {
                self.timers.cancel(id);
                true
            }
            None => false,
        }
    }

    pub fn forget(&mut self, participant: ParticipantId) {
        self.on_returned(participant);
    }

    /// Advances every countdown; returns participants whose time ran out.
    pub fn advance(&mut self, dt: Duration) -> Vec<ParticipantId> {
        let expired = self.timers.advance(dt);
        for participant in &expired {
            self.outside.remove(participant);
        }
        expired
    }

    pub fn clear(&mut self) {
        self.timers.clear();
        self.outside.clear();
    }
}
