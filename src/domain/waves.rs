// Wave scheduler: spawn-then-wait-for-clear cycles with escalating enemy counts.

use crate::domain::errors::{KillRejected, WaveError};
use crate::domain::replicated::{ReplicaHandle, Replicated};
use crate::domain::tuning::WaveTuning;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveState {
    Idle,
    /// `spawned` of the wave's enemies have been issued so far.
    Spawning { spawned: u32 },
    WaitingForClear,
    /// Cleared; held until the upgrade gate lets the session continue.
    AwaitingUpgrades,
    /// Short pause before the next wave.
    Intermission,
}

/// What the session must do after driving the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveStep {
    /// Spawn one enemy now; call `spawn_tick` again after `next_in` if set.
    Spawn { next_in: Option<Duration> },
    /// Every enemy of `wave` is dead; run the upgrade check, then `resume`.
    Cleared { wave: u32 },
    /// Nothing to do right now.
    Wait,
}

/// Outcome of a confirmed enemy death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillRecorded {
    pub killed: u32,
    pub total: u32,
    pub cleared: Option<u32>,
}

#[derive(Debug)]
pub struct WaveScheduler {
    tuning: WaveTuning,
    state: WaveState,
    wave: Replicated<u32>,
    total: Replicated<u32>,
    killed: Replicated<u32>,
    active: Replicated<bool>,
}

/// Read-only handles for the scheduler's replicated values.
#[derive(Debug, Clone)]
pub struct WaveReplicas {
    pub wave: ReplicaHandle<u32>,
    pub total: ReplicaHandle<u32>,
    pub killed: ReplicaHandle<u32>,
    pub active: ReplicaHandle<bool>,
}

impl WaveScheduler {
    pub fn new(tuning: WaveTuning) -> Self {
        Self {
            tuning,
            state: WaveState::Idle,
            wave: Replicated::new("wave", 0),
            total: Replicated::new("enemies_total", 0),
            killed: Replicated::new("enemies_killed", 0),
            active: Replicated::new("wave_active", false),
        }
    }

    pub fn replicas(&self) -> WaveReplicas {
        WaveReplicas {
            wave: self.wave.handle(),
            total: self.total.handle(),
            killed: self.killed.handle(),
            active: self.active.handle(),
        }
    }

    pub fn state(&self) -> WaveState {
        self.state
    }

    pub fn wave(&self) -> u32 {
        *self.wave.get()
    }

    pub fn total(&self) -> u32 {
        *self.total.get()
    }

    pub fn killed(&self) -> u32 {
        *self.killed.get()
    }

    pub fn is_active(&self) -> bool {
        *self.active.get()
    }

    /// Starts wave 1. Only valid once per session.
    pub fn start(&mut self) -> Result<WaveStep, WaveError> {
        if self.state != WaveState::Idle {
            return Err(WaveError::AlreadyStarted);
        }
        Ok(self.begin_wave())
    }

    /// Drives the spawn throttle; call when the spawn timer fires.
    pub fn spawn_tick(&mut self) -> WaveStep {
        let WaveState::Spawning { spawned } = self.state else {
            return WaveStep::Wait;
        };
        let total = self.total();
        if spawned >= total {
            return self.finish_spawning();
        }

        let spawned = spawned + 1;
        self.state = WaveState::Spawning { spawned };
        WaveStep::Spawn {
            next_in: Some(self.tuning.spawn_interval),
        }
    }

    /// Counts a confirmed death. Rejected while no wave is active.
    pub fn on_enemy_killed(&mut self) -> Result<KillRecorded, KillRejected> {
        if !self.is_active() {
            return Err(KillRejected::WaveInactive);
        }

        let total = self.total();
        self.killed.update(|k| (k + 1).min(total));
        let killed = self.killed();

        let cleared = if self.state == WaveState::WaitingForClear && killed >= total {
            self.clear()
        } else {
            None
        };

        Ok(KillRecorded {
            killed,
            total,
            cleared,
        })
    }

    /// Leaves `AwaitingUpgrades`; returns how long to wait before `next_wave`.
    pub fn resume(&mut self) -> Option<Duration> {
        if self.state != WaveState::AwaitingUpgrades {
            return None;
        }
        self.state = WaveState::Intermission;
        Some(self.tuning.intermission)
    }

    /// Starts the following wave after the intermission.
    pub fn next_wave(&mut self) -> WaveStep {
        if self.state != WaveState::Intermission {
            return WaveStep::Wait;
        }
        self.begin_wave()
    }

    fn begin_wave(&mut self) -> WaveStep {
        let wave = self.wave() + 1;
        let total = self.tuning.total_for_wave(wave);

        self.wave.set(wave);
        self.killed.set(0);
        self.total.set(total);
        self.active.set(true);
        self.state = WaveState::Spawning { spawned: 0 };

        tracing::info!(wave, total, "wave started");
        self.spawn_tick()
    }

    fn finish_spawning(&mut self) -> WaveStep {
        self.state = WaveState::WaitingForClear;
        tracing::debug!(wave = self.wave(), total = self.total(), "all enemies spawned");
        match self.clear() {
            Some(wave) => WaveStep::Cleared { wave },
            None => WaveStep::Wait,
        }
    }

    fn clear(&mut self) -> Option<u32> {
        if self.killed() < self.total() {
            return None;
        }
        self.active.set(false);
        self.state = WaveState::AwaitingUpgrades;
        let wave = self.wave();
        tracing::info!(wave, total = self.total(), "wave cleared");
        Some(wave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning(base: u32, per_wave: u32) -> WaveTuning {
        WaveTuning {
            base_enemies: base,
            enemies_per_wave: per_wave,
            ..WaveTuning::default()
        }
    }

    // Issues every spawn of the current wave, returning how many were requested.
    fn spawn_all(waves: &mut WaveScheduler, first: WaveStep) -> (u32, WaveStep) {
        let mut step = first;
        let mut spawned = 0;
        while let WaveStep::Spawn { .. } = step {
            spawned += 1;
            step = waves.spawn_tick();
        }
        (spawned, step)
    }

    #[test]
    fn when_waves_advance_then_total_follows_base_plus_increment() {
        let mut waves = WaveScheduler::new(tuning(10, 5));

        let first = waves.start().unwrap();
        assert_eq!(waves.wave(), 1);
        assert_eq!(waves.total(), 10);
        let (spawned, _) = spawn_all(&mut waves, first);
        assert_eq!(spawned, 10);

        for wave in 2..=3 {
            for _ in 0..waves.total() {
                waves.on_enemy_killed().unwrap();
            }
            waves.resume().unwrap();
            let step = waves.next_wave();
            assert_eq!(waves.wave(), wave);
            spawn_all(&mut waves, step);
        }

        assert_eq!(waves.total(), 20);
    }

    #[test]
    fn when_last_kill_lands_after_spawning_then_wave_clears_exactly_once() {
        let mut waves = WaveScheduler::new(tuning(3, 0));
        let first = waves.start().unwrap();
        let (_, step) = spawn_all(&mut waves, first);
        assert_eq!(step, WaveStep::Wait);
        assert_eq!(waves.state(), WaveState::WaitingForClear);

        assert_eq!(waves.on_enemy_killed().unwrap().cleared, None);
        assert_eq!(waves.on_enemy_killed().unwrap().cleared, None);
        let last = waves.on_enemy_killed().unwrap();

        assert_eq!(last.cleared, Some(1));
        assert!(!waves.is_active());
        assert_eq!(waves.on_enemy_killed(), Err(KillRejected::WaveInactive));
    }

    #[test]
    fn when_kills_finish_during_spawning_then_clear_happens_after_last_spawn() {
        let mut waves = WaveScheduler::new(tuning(2, 0));
        let mut step = waves.start().unwrap();
        assert!(matches!(step, WaveStep::Spawn { .. }));

        waves.on_enemy_killed().unwrap();
        step = waves.spawn_tick();
        assert!(matches!(step, WaveStep::Spawn { .. }));
        let kill = waves.on_enemy_killed().unwrap();
        assert_eq!(kill.cleared, None);

        assert_eq!(waves.spawn_tick(), WaveStep::Cleared { wave: 1 });
    }

    #[test]
    fn when_kills_exceed_total_then_counter_is_clamped() {
        let mut waves = WaveScheduler::new(tuning(2, 0));
        waves.start().unwrap();

        for _ in 0..5 {
            let _ = waves.on_enemy_killed();
        }

        assert_eq!(waves.killed(), waves.total());
    }

    #[test]
    fn when_not_started_then_kills_are_rejected() {
        let mut waves = WaveScheduler::new(WaveTuning::default());

        assert_eq!(waves.on_enemy_killed(), Err(KillRejected::WaveInactive));
        assert_eq!(waves.killed(), 0);
    }

    #[test]
    fn when_started_twice_then_returns_already_started() {
        let mut waves = WaveScheduler::new(WaveTuning::default());
        waves.start().unwrap();

        assert_eq!(waves.start(), Err(WaveError::AlreadyStarted));
    }

    #[test]
    fn when_resume_is_called_outside_the_gate_then_it_is_ignored() {
        let mut waves = WaveScheduler::new(WaveTuning::default());
        waves.start().unwrap();

        assert_eq!(waves.resume(), None);
        assert_eq!(waves.next_wave(), WaveStep::Wait);
    }

    #[test]
    fn when_wave_changes_then_observers_see_progress_values() {
        let mut waves = WaveScheduler::new(tuning(1, 1));
        let mut wave_mirror = waves.replicas().wave.subscribe();
        let mut total_mirror = waves.replicas().total.subscribe();

        waves.start().unwrap();

        assert_eq!(wave_mirror.try_changed().map(|c| c.new), Some(1));
        assert_eq!(total_mirror.try_changed().map(|c| c.new), Some(1));
    }
}
