// Lives per slot and the shared score. The session is the only writer.

use crate::domain::participant::Slot;
use crate::domain::replicated::{ReplicaHandle, Replicated};

/// Result of a life loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifeLost {
    pub slot: Slot,
    pub remaining: u32,
    /// True when this loss emptied the slot.
    pub depleted: bool,
}

#[derive(Debug)]
pub struct LivesAuthority {
    max_lives: u32,
    lives: Vec<Replicated<u32>>,
    score: Replicated<u32>,
}

#[derive(Debug, Clone)]
pub struct LivesReplicas {
    /// Indexed by slot.
    pub lives: Vec<ReplicaHandle<u32>>,
    pub score: ReplicaHandle<u32>,
}

impl LivesAuthority {
    pub fn new(slots: usize, max_lives: u32) -> Self {
        Self {
            max_lives,
            lives: (0..slots)
                .map(|_| Replicated::new("lives", max_lives))
                .collect(),
            score: Replicated::new("score", 0),
        }
    }

    pub fn replicas(&self) -> LivesReplicas {
        LivesReplicas {
            lives: self.lives.iter().map(Replicated::handle).collect(),
            score: self.score.handle(),
        }
    }

    pub fn lives(&self, slot: Slot) -> Option<u32> {
        self.lives.get(slot.index()).map(|l| *l.get())
    }

    pub fn score(&self) -> u32 {
        *self.score.get()
    }

    /// Decrements a slot's lives, clamped at zero. `None` for an unknown slot.
    pub fn lose_life(&mut self, slot: Slot) -> Option<LifeLost> {
        let lives = self.lives.get_mut(slot.index())?;
        let before = *lives.get();
        lives.set(before.saturating_sub(1));
        let remaining = *lives.get();
        Some(LifeLost {
            slot,
            remaining,
            depleted: remaining == 0,
        })
    }

    pub fn add_score(&mut self, amount: u32) -> u32 {
        self.score.update(|s| s.saturating_add(amount));
        self.score()
    }

    /// Fresh match: full lives in every slot and zero score.
    pub fn reset(&mut self) {
        for lives in &mut self.lives {
            lives.set(self.max_lives);
        }
        self.score.set(0);
    }
}
