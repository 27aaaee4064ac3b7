// Authoritative co-op session: lobby, wave loop, upgrade rounds, lives and bounds.
// The session is the single writer of every replicated value it owns.

use crate::domain::tuning::GameTuning;
use crate::domain::{
    BoundsMonitor, Catalogs, LivesAuthority, Loadout, ParticipantId, PauseReason, Position,
    Replicated, Roster, SimClock, Slot, SpawnDirector, TimerId, TimerQueue, UpgradeGate,
    WaveScheduler, WaveStep,
};
use crate::use_cases::replication::SessionReplicas;
use crate::use_cases::types::{
    Audience, DespawnReason, EnemyId, EnemyView, Envelope, LoadoutView, Notification, SessionEvent,
    SessionPhase, UpgradeOption,
};
use rand::rngs::StdRng;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTimer {
    CountdownTick,
    SpawnNext,
    Intermission,
}

#[derive(Debug)]
pub struct Session {
    tuning: GameTuning,
    rng: StdRng,
    roster: Roster,

    phase: Replicated<SessionPhase>,
    countdown: Replicated<u32>,
    time_scale: Replicated<f32>,
    names: Vec<Replicated<String>>,

    clock: SimClock,
    timers: TimerQueue<SessionTimer>,
    countdown_timer: Option<TimerId>,

    spawner: SpawnDirector,
    waves: WaveScheduler,
    upgrades: UpgradeGate,
    lives: LivesAuthority,
    bounds: BoundsMonitor,

    // Live enemies in spawn order; ids only grow, so the list stays sorted.
    enemies: Replicated<Vec<EnemyView>>,
    next_enemy_id: EnemyId,

    notify_tx: broadcast::Sender<Envelope>,
}

impl Session {
    pub fn new(
        tuning: GameTuning,
        catalogs: &Catalogs,
        rng: StdRng,
        notify_tx: broadcast::Sender<Envelope>,
    ) -> Self {
        let slots = tuning.lobby.max_players;
        let starting_loadout = Loadout::new(
            tuning.player.move_speed,
            catalogs.starting_weapon().clone(),
        );

        Self {
            tuning,
            rng,
            roster: Roster::new(slots, starting_loadout),
            phase: Replicated::new("phase", SessionPhase::WaitingForPlayers),
            countdown: Replicated::new("countdown", 0),
            time_scale: Replicated::new("time_scale", 1.0),
            names: (0..slots)
                .map(|_| Replicated::new("player_name", String::new()))
                .collect(),
            clock: SimClock::new(),
            timers: TimerQueue::new(),
            countdown_timer: None,
            spawner: SpawnDirector::new(catalogs.enemies(), tuning.spawn),
            waves: WaveScheduler::new(tuning.waves),
            upgrades: UpgradeGate::new(catalogs.upgrades(), tuning.upgrades, slots),
            lives: LivesAuthority::new(slots, tuning.player.max_lives),
            bounds: BoundsMonitor::new(tuning.player.out_of_bounds_timeout),
            enemies: Replicated::new("enemies", Vec::new()),
            next_enemy_id: 1,
            notify_tx,
        }
    }

    pub fn replicas(&self) -> SessionReplicas {
        SessionReplicas {
            phase: self.phase.handle(),
            countdown: self.countdown.handle(),
            time_scale: self.time_scale.handle(),
            names: self.names.iter().map(Replicated::handle).collect(),
            waves: self.waves.replicas(),
            upgrades: self.upgrades.replicas(),
            lives: self.lives.replicas(),
            enemies: self.enemies.handle(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.get()
    }

    pub fn countdown(&self) -> u32 {
        *self.countdown.get()
    }

    pub fn time_scale(&self) -> f32 {
        *self.time_scale.get()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn waves(&self) -> &WaveScheduler {
        &self.waves
    }

    pub fn upgrades(&self) -> &UpgradeGate {
        &self.upgrades
    }

    pub fn lives(&self) -> &LivesAuthority {
        &self.lives
    }

    pub fn bounds(&self) -> &BoundsMonitor {
        &self.bounds
    }

    /// Ids of live enemies, ascending.
    pub fn enemy_ids(&self) -> Vec<EnemyId> {
        self.enemies.get().iter().map(|e| e.enemy_id).collect()
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join { participant_id } => self.join(participant_id),
            SessionEvent::Leave { participant_id } => self.leave(participant_id),
            SessionEvent::Ready {
                participant_id,
                display_name,
            } => self.ready(participant_id, &display_name),
            SessionEvent::Move {
                participant_id,
                position,
            } => self.move_to(participant_id, position),
            SessionEvent::SelectUpgrade {
                participant_id,
                index,
            } => self.select_upgrade(participant_id, index),
            SessionEvent::EnemyKilled {
                participant_id,
                enemy_id,
            } => self.enemy_killed(participant_id, enemy_id),
            SessionEvent::PlayerHit {
                participant_id,
                enemy_id,
            } => self.player_hit(participant_id, enemy_id),
            SessionEvent::LeftBounds { participant_id } => self.left_bounds(participant_id),
            SessionEvent::ReturnedToBounds { participant_id } => {
                self.returned_to_bounds(participant_id)
            }
        }
    }

    /// Advances simulated time. Nothing moves while the clock is paused.
    pub fn advance(&mut self, dt: Duration) {
        let dt = self.clock.tick(dt);
        if dt.is_zero() {
            return;
        }

        for timer in self.timers.advance(dt) {
            if self.phase() == SessionPhase::GameOver {
                return;
            }
            self.fire(timer);
        }

        let expired = self.bounds.advance(dt);
        if let Some(participant_id) = expired.first() {
            warn!(participant_id, "participant stayed out of bounds too long");
            self.game_over("out of bounds");
        }
    }

    fn fire(&mut self, timer: SessionTimer) {
        match timer {
            SessionTimer::CountdownTick => self.countdown_tick(),
            SessionTimer::SpawnNext => {
                let step = self.waves.spawn_tick();
                self.apply_wave_step(step);
            }
            SessionTimer::Intermission => {
                let step = self.waves.next_wave();
                self.apply_wave_step(step);
            }
        }
    }

    // Lobby

    fn join(&mut self, participant_id: ParticipantId) {
        if let Err(e) = self.roster.join(participant_id) {
            warn!(participant_id, error = ?e, "join rejected");
            return;
        }
        info!(participant_id, phase = self.phase().as_str(), "participant joined");
        self.refresh_lobby();
    }

    fn leave(&mut self, participant_id: ParticipantId) {
        let phase = self.phase();
        let Some(participant) = self.roster.leave(participant_id, phase.is_lobby()) else {
            warn!(participant_id, "leave for unknown participant");
            return;
        };

        self.bounds.forget(participant_id);
        self.upgrades.forget(participant_id);
        if phase.is_lobby() {
            if let Some(name) = participant.slot.and_then(|s| self.names.get_mut(s.index())) {
                name.set(String::new());
            }
        }
        info!(
            participant_id,
            slot = participant.slot.map(Slot::number),
            phase = phase.as_str(),
            "participant left"
        );

        match phase {
            SessionPhase::Playing => self.check_all_chosen(),
            p if p.is_lobby() => self.refresh_lobby(),
            _ => {}
        }
    }

    fn ready(&mut self, participant_id: ParticipantId, display_name: &str) {
        if !self.phase().is_lobby() {
            warn!(participant_id, phase = self.phase().as_str(), "ready ignored outside lobby");
            return;
        }

        let change = match self.roster.toggle_ready(participant_id, display_name) {
            Ok(change) => change,
            Err(e) => {
                warn!(participant_id, error = ?e, "ready rejected");
                return;
            }
        };

        if change.ready {
            if let Some(name) = self.names.get_mut(change.slot.index()) {
                name.set(change.display_name.clone());
            }
        }
        info!(
            participant_id,
            slot = change.slot.number(),
            ready = change.ready,
            display_name = %change.display_name,
            "ready toggled"
        );
        self.notify(
            Audience::All,
            Notification::ReadyChanged {
                slot: change.slot,
                ready: change.ready,
                display_name: change.display_name,
            },
        );
        self.refresh_lobby();
    }

    // Moves between the lobby phases and starts or cancels the countdown.
    fn refresh_lobby(&mut self) {
        let phase = self.phase();
        if !phase.is_lobby() {
            return;
        }

        let min_players = self.tuning.lobby.min_players;
        if self.roster.all_players_ready(min_players) {
            if phase != SessionPhase::StartingGame {
                self.start_countdown();
            }
            return;
        }

        if phase == SessionPhase::StartingGame {
            self.cancel_countdown();
        }
        let next = if self.roster.len() >= min_players {
            SessionPhase::FoundPlayers
        } else {
            SessionPhase::WaitingForPlayers
        };
        self.phase.set(next);
    }

    fn start_countdown(&mut self) {
        let seconds = self.tuning.lobby.countdown_seconds;
        self.phase.set(SessionPhase::StartingGame);
        info!(seconds, "all players ready; countdown started");
        if seconds == 0 {
            self.start_match();
            return;
        }
        self.countdown.set(seconds);
        self.countdown_timer =
            Some(self.timers.schedule(COUNTDOWN_STEP, SessionTimer::CountdownTick));
    }

    fn cancel_countdown(&mut self) {
        if let Some(id) = self.countdown_timer.take() {
            self.timers.cancel(id);
        }
        self.countdown.set(0);
        info!("countdown cancelled");
    }

    fn countdown_tick(&mut self) {
        self.countdown_timer = None;
        let remaining = self.countdown().saturating_sub(1);
        self.countdown.set(remaining);
        if remaining == 0 {
            self.start_match();
        } else {
            self.countdown_timer =
                Some(self.timers.schedule(COUNTDOWN_STEP, SessionTimer::CountdownTick));
        }
    }

    fn start_match(&mut self) {
        self.phase.set(SessionPhase::Playing);
        self.lives.reset();
        info!(players = self.roster.player_count(), "match started");
        self.notify(Audience::All, Notification::MatchStarted);

        match self.waves.start() {
            Ok(step) => self.apply_wave_step(step),
            Err(e) => error!(error = ?e, "wave scheduler already running"),
        }
    }

    // Waves and enemies

    fn apply_wave_step(&mut self, step: WaveStep) {
        match step {
            WaveStep::Spawn { next_in } => {
                self.spawn_enemy();
                if let Some(delay) = next_in {
                    self.timers.schedule(delay, SessionTimer::SpawnNext);
                }
            }
            WaveStep::Cleared { wave } => self.on_wave_cleared(wave),
            WaveStep::Wait => {}
        }
    }

    fn spawn_enemy(&mut self) {
        let anchors = self.roster.anchors();
        let Some(plan) = self.spawner.plan(&anchors, &mut self.rng) else {
            error!(wave = self.waves.wave(), "no spawnable enemy in catalog");
            return;
        };

        let enemy_id = self.next_enemy_id;
        self.next_enemy_id += 1;
        let view = EnemyView {
            enemy_id,
            kind: plan.kind.name,
            rarity: plan.kind.rarity,
            movement: plan.kind.movement,
            move_speed: plan.kind.move_speed,
            chase_range: plan.kind.chase_range,
            max_health: plan.kind.max_health,
            position: plan.position,
        };
        debug!(
            enemy_id,
            kind = %view.kind,
            rarity = ?view.rarity,
            x = view.position.x,
            y = view.position.y,
            "enemy spawned"
        );
        self.enemies.update(|live| {
            let mut live = live.clone();
            live.push(view.clone());
            live
        });
        self.notify(Audience::All, Notification::EnemySpawned(view));
    }

    fn is_live_enemy(&self, enemy_id: EnemyId) -> bool {
        self.enemies.get().iter().any(|e| e.enemy_id == enemy_id)
    }

    fn despawn_enemy(&mut self, enemy_id: EnemyId, reason: DespawnReason) {
        self.enemies.update(|live| {
            live.iter()
                .filter(|e| e.enemy_id != enemy_id)
                .cloned()
                .collect()
        });
        self.notify(
            Audience::All,
            Notification::EnemyDespawned { enemy_id, reason },
        );
    }

    fn enemy_killed(&mut self, participant_id: ParticipantId, enemy_id: EnemyId) {
        if self.phase() != SessionPhase::Playing {
            warn!(participant_id, enemy_id, "kill ignored outside play");
            return;
        }
        if self.roster.slot_of(participant_id).is_none() {
            warn!(participant_id, enemy_id, "kill from non-player ignored");
            return;
        }
        if !self.is_live_enemy(enemy_id) {
            warn!(participant_id, enemy_id, "kill for unknown or already dead enemy");
            return;
        }

        // The enemy stays registered when the scheduler refuses the kill.
        let kill = match self.waves.on_enemy_killed() {
            Ok(kill) => kill,
            Err(e) => {
                warn!(participant_id, enemy_id, error = ?e, "kill rejected");
                return;
            }
        };
        self.despawn_enemy(enemy_id, DespawnReason::Killed);
        let score = self.lives.add_score(self.tuning.lobby.score_per_kill);
        debug!(
            participant_id,
            enemy_id,
            killed = kill.killed,
            total = kill.total,
            score,
            "enemy killed"
        );

        if let Some(wave) = kill.cleared {
            self.on_wave_cleared(wave);
        }
    }

    fn player_hit(&mut self, participant_id: ParticipantId, enemy_id: Option<EnemyId>) {
        if self.phase() != SessionPhase::Playing || !self.clock.is_running() {
            debug!(participant_id, "hit ignored while not simulating");
            return;
        }
        let Some(slot) = self.roster.slot_of(participant_id) else {
            warn!(participant_id, "hit for non-player ignored");
            return;
        };

        let mut cleared = None;
        if let Some(enemy_id) = enemy_id {
            if !self.is_live_enemy(enemy_id) {
                warn!(participant_id, enemy_id, "hit from unknown or already dead enemy");
                return;
            }
            match self.waves.on_enemy_killed() {
                Ok(kill) => {
                    self.despawn_enemy(enemy_id, DespawnReason::Contact);
                    cleared = kill.cleared;
                }
                Err(e) => warn!(participant_id, enemy_id, error = ?e, "contact kill not counted"),
            }
        }

        let Some(lost) = self.lives.lose_life(slot) else {
            return;
        };
        info!(
            participant_id,
            slot = slot.number(),
            remaining = lost.remaining,
            "life lost"
        );
        if lost.depleted {
            self.game_over("lives depleted");
            return;
        }

        if let Some(wave) = cleared {
            self.on_wave_cleared(wave);
        }
    }

    // Upgrade rounds

    fn on_wave_cleared(&mut self, wave: u32) {
        let live = self.roster.player_count();
        if self.upgrades.should_trigger(wave)
            && live > 0
            && self.upgrades.start_round(&mut self.rng).is_some()
        {
            self.clock.pause(PauseReason::UpgradeRound);
            self.sync_time_scale();
            let options = self
                .upgrades
                .offered()
                .iter()
                .map(|u| UpgradeOption {
                    name: u.name.clone(),
                    description: u.description.clone(),
                })
                .collect();
            info!(wave, live, "upgrade round opened");
            self.notify(Audience::All, Notification::ShowUpgradePanel { options });
            return;
        }
        self.resume_waves();
    }

    fn select_upgrade(&mut self, participant_id: ParticipantId, index: usize) {
        if self.phase() != SessionPhase::Playing {
            warn!(participant_id, index, "upgrade selection ignored outside play");
            return;
        }

        let slot = self.roster.slot_of(participant_id);
        let upgrade = match self.upgrades.select(participant_id, slot, index) {
            Ok(upgrade) => upgrade,
            Err(e) => {
                warn!(participant_id, index, error = ?e, "upgrade selection rejected");
                return;
            }
        };

        let Some(participant) = self.roster.get_mut(participant_id) else {
            return;
        };
        participant.loadout.apply(&upgrade.effect);
        let view = loadout_view(&participant.loadout);
        info!(participant_id, upgrade = %upgrade.name, "upgrade selected");

        self.notify(
            Audience::Participant(participant_id),
            Notification::LoadoutChanged(view),
        );
        self.notify(
            Audience::Participant(participant_id),
            Notification::HideUpgradePanel,
        );
        self.check_all_chosen();
    }

    fn check_all_chosen(&mut self) {
        if !self.upgrades.is_active() || !self.upgrades.is_complete(self.roster.player_count()) {
            return;
        }

        self.upgrades.end_round();
        self.clock.resume(PauseReason::UpgradeRound);
        self.sync_time_scale();
        self.notify(Audience::All, Notification::HideUpgradePanel);
        self.resume_waves();
    }

    fn resume_waves(&mut self) {
        if let Some(delay) = self.waves.resume() {
            self.timers.schedule(delay, SessionTimer::Intermission);
        }
    }

    // Bounds

    fn left_bounds(&mut self, participant_id: ParticipantId) {
        if self.phase() != SessionPhase::Playing {
            debug!(participant_id, "bounds exit ignored outside play");
            return;
        }
        if self.roster.slot_of(participant_id).is_none() {
            warn!(participant_id, "bounds exit for non-player ignored");
            return;
        }
        if !self.bounds.on_left(participant_id) {
            return;
        }

        let seconds_left = self.bounds.timeout().as_secs_f32();
        info!(participant_id, seconds_left, "participant left bounds");
        self.notify(
            Audience::Participant(participant_id),
            Notification::BoundsWarning {
                visible: true,
                seconds_left,
            },
        );
    }

    fn returned_to_bounds(&mut self, participant_id: ParticipantId) {
        if !self.bounds.on_returned(participant_id) {
            return;
        }
        info!(participant_id, "participant returned to bounds");
        self.notify(
            Audience::Participant(participant_id),
            Notification::BoundsWarning {
                visible: false,
                seconds_left: 0.0,
            },
        );
    }

    fn move_to(&mut self, participant_id: ParticipantId, position: Position) {
        if !position.x.is_finite() || !position.y.is_finite() {
            warn!(participant_id, "non-finite position dropped");
            return;
        }
        if let Some(participant) = self.roster.get_mut(participant_id) {
            participant.position = position;
        }
    }

    // Terminal

    fn game_over(&mut self, reason: &'static str) {
        if self.phase() == SessionPhase::GameOver {
            return;
        }

        self.phase.set(SessionPhase::GameOver);
        self.clock.pause(PauseReason::GameOver);
        self.sync_time_scale();
        self.timers.clear();
        self.countdown_timer = None;
        self.bounds.clear();

        let final_score = self.lives.score();
        info!(reason, final_score, wave = self.waves.wave(), "game over");
        self.notify(Audience::All, Notification::GameOver { final_score });
    }

    fn sync_time_scale(&mut self) {
        self.time_scale.set(self.clock.time_scale());
    }

    fn notify(&self, audience: Audience, notification: Notification) {
        // No connected clients is fine.
        let _ = self.notify_tx.send(Envelope {
            audience,
            notification,
        });
    }
}

fn loadout_view(loadout: &Loadout) -> LoadoutView {
    let weapon = loadout.weapon();
    LoadoutView {
        move_speed: loadout.move_speed(),
        fire_interval: loadout.fire_interval(),
        damage: loadout.damage(),
        weapon: weapon.name.clone(),
        pattern: weapon.pattern,
        bullet_speed: weapon.bullet_speed,
        bullet_lifetime: weapon.bullet_lifetime,
        piercing: weapon.piercing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fixtures::catalogs;
    use crate::use_cases::types::StateValue;
    use rand::SeedableRng;

    const P1: ParticipantId = 101;
    const P2: ParticipantId = 202;

    struct Harness {
        session: Session,
        notes: broadcast::Receiver<Envelope>,
    }

    impl Harness {
        fn new() -> Self {
            let mut tuning = GameTuning::default();
            tuning.waves.base_enemies = 2;
            tuning.waves.enemies_per_wave = 1;
            Self::with_tuning(tuning)
        }

        fn with_tuning(tuning: GameTuning) -> Self {
            Self::with_capacity(tuning, 1024)
        }

        fn with_capacity(tuning: GameTuning, capacity: usize) -> Self {
            let (notify_tx, notes) = broadcast::channel(capacity);
            let session = Session::new(tuning, &catalogs(), StdRng::seed_from_u64(7), notify_tx);
            Self { session, notes }
        }

        fn send(&mut self, event: SessionEvent) {
            self.session.handle(event);
        }

        fn advance(&mut self, dt: Duration) {
            self.session.advance(dt);
        }

        fn drain(&mut self) -> Vec<Envelope> {
            let mut out = Vec::new();
            while let Ok(envelope) = self.notes.try_recv() {
                out.push(envelope);
            }
            out
        }

        fn join_and_ready(&mut self, ids: &[ParticipantId]) {
            for &id in ids {
                self.send(SessionEvent::Join { participant_id: id });
            }
            for &id in ids {
                self.send(SessionEvent::Ready {
                    participant_id: id,
                    display_name: format!("P{id}"),
                });
            }
        }

        fn start_match(&mut self) {
            self.join_and_ready(&[P1, P2]);
            for _ in 0..3 {
                self.advance(COUNTDOWN_STEP);
            }
            assert_eq!(self.session.phase(), SessionPhase::Playing);
        }

        // Lets every spawn of the current wave happen, then kills all enemies.
        fn clear_wave(&mut self) {
            let total = self.session.waves().total();
            for _ in 0..total {
                self.advance(Duration::from_millis(500));
            }
            for enemy_id in self.session.enemy_ids() {
                self.send(SessionEvent::EnemyKilled {
                    participant_id: P1,
                    enemy_id,
                });
            }
        }

        fn next_wave(&mut self) {
            self.advance(Duration::from_secs(1));
        }
    }

    fn count(envelopes: &[Envelope], pred: impl Fn(&Notification) -> bool) -> usize {
        envelopes.iter().filter(|e| pred(&e.notification)).count()
    }

    #[test]
    fn when_both_players_ready_then_countdown_leads_into_wave_one() {
        let mut h = Harness::new();

        h.send(SessionEvent::Join { participant_id: P1 });
        assert_eq!(h.session.phase(), SessionPhase::WaitingForPlayers);
        h.send(SessionEvent::Join { participant_id: P2 });
        assert_eq!(h.session.phase(), SessionPhase::FoundPlayers);

        h.send(SessionEvent::Ready {
            participant_id: P1,
            display_name: "Ana".to_string(),
        });
        h.send(SessionEvent::Ready {
            participant_id: P2,
            display_name: "Ben".to_string(),
        });
        assert_eq!(h.session.phase(), SessionPhase::StartingGame);
        assert_eq!(h.session.countdown(), 3);

        h.advance(COUNTDOWN_STEP);
        h.advance(COUNTDOWN_STEP);
        assert_eq!(h.session.countdown(), 1);
        h.advance(COUNTDOWN_STEP);

        assert_eq!(h.session.phase(), SessionPhase::Playing);
        assert_eq!(h.session.waves().wave(), 1);
        assert_eq!(h.session.enemy_ids().len(), 1);
        let notes = h.drain();
        assert_eq!(count(&notes, |n| *n == Notification::MatchStarted), 1);
        assert_eq!(
            count(&notes, |n| matches!(n, Notification::ReadyChanged { .. })),
            2
        );
    }

    #[test]
    fn when_player_leaves_during_countdown_then_lobby_waits_again() {
        let mut h = Harness::new();
        h.join_and_ready(&[P1, P2]);
        h.advance(COUNTDOWN_STEP);

        h.send(SessionEvent::Leave { participant_id: P2 });
        h.advance(Duration::from_secs(10));

        assert_eq!(h.session.phase(), SessionPhase::WaitingForPlayers);
        assert_eq!(h.session.countdown(), 0);
        assert_eq!(h.session.waves().wave(), 0);
    }

    #[test]
    fn when_player_unreadies_during_countdown_then_countdown_is_cancelled() {
        let mut h = Harness::new();
        h.join_and_ready(&[P1, P2]);

        h.send(SessionEvent::Ready {
            participant_id: P1,
            display_name: "P101".to_string(),
        });
        h.advance(Duration::from_secs(10));

        assert_eq!(h.session.phase(), SessionPhase::FoundPlayers);
        assert_eq!(h.session.countdown(), 0);
    }

    #[test]
    fn when_wave_is_cleared_then_next_wave_has_one_more_enemy() {
        let mut h = Harness::new();
        h.start_match();

        h.clear_wave();
        assert!(!h.session.waves().is_active());
        assert_eq!(h.session.lives().score(), 30);

        h.next_wave();

        assert_eq!(h.session.waves().wave(), 2);
        assert_eq!(h.session.waves().total(), 3);
        assert!(h.session.waves().is_active());
    }

    #[test]
    fn when_same_enemy_is_reported_twice_then_it_counts_once() {
        let mut h = Harness::new();
        h.start_match();
        let enemy_id = h.session.enemy_ids()[0];

        for participant_id in [P1, P2] {
            h.send(SessionEvent::EnemyKilled {
                participant_id,
                enemy_id,
            });
        }

        assert_eq!(h.session.waves().killed(), 1);
        assert_eq!(h.session.lives().score(), 15);
    }

    #[test]
    fn when_kill_arrives_before_match_then_it_is_ignored() {
        let mut h = Harness::new();
        h.join_and_ready(&[P1, P2]);

        h.send(SessionEvent::EnemyKilled {
            participant_id: P1,
            enemy_id: 1,
        });

        assert_eq!(h.session.waves().killed(), 0);
        assert_eq!(h.session.lives().score(), 0);
    }

    #[test]
    fn when_enemy_touches_player_then_enemy_dies_without_score_and_life_is_lost() {
        let mut h = Harness::new();
        h.start_match();
        let enemy_id = h.session.enemy_ids()[0];
        let slot = h.session.roster().slot_of(P2).expect("P2 has a slot");

        h.send(SessionEvent::PlayerHit {
            participant_id: P2,
            enemy_id: Some(enemy_id),
        });
        h.send(SessionEvent::PlayerHit {
            participant_id: P2,
            enemy_id: Some(enemy_id),
        });

        assert_eq!(h.session.lives().lives(slot), Some(2));
        assert_eq!(h.session.waves().killed(), 1);
        assert_eq!(h.session.lives().score(), 0);
        assert!(h.session.enemy_ids().is_empty());
    }

    #[test]
    fn when_one_player_loses_every_life_then_game_over_fires_once() {
        let mut h = Harness::new();
        h.start_match();
        h.drain();

        for _ in 0..3 {
            h.send(SessionEvent::PlayerHit {
                participant_id: P1,
                enemy_id: None,
            });
        }
        for participant_id in [P1, P2, P2, P2] {
            h.send(SessionEvent::PlayerHit {
                participant_id,
                enemy_id: None,
            });
        }

        assert_eq!(h.session.phase(), SessionPhase::GameOver);
        assert_eq!(h.session.time_scale(), 0.0);
        let slot = h.session.roster().slot_of(P2).expect("P2 has a slot");
        assert_eq!(h.session.lives().lives(slot), Some(3));
        let notes = h.drain();
        assert_eq!(
            count(&notes, |n| matches!(n, Notification::GameOver { .. })),
            1
        );
    }

    #[test]
    fn when_game_is_over_then_time_stops_and_no_more_enemies_spawn() {
        let mut h = Harness::new();
        h.start_match();
        for _ in 0..3 {
            h.send(SessionEvent::PlayerHit {
                participant_id: P1,
                enemy_id: None,
            });
        }
        let before = h.session.enemy_ids();

        h.advance(Duration::from_secs(30));

        assert_eq!(h.session.enemy_ids(), before);
        assert_eq!(h.session.waves().wave(), 1);
    }

    #[test]
    fn when_player_returns_in_time_then_no_game_over_but_second_exit_ends_game() {
        let mut h = Harness::new();
        h.start_match();

        h.send(SessionEvent::LeftBounds { participant_id: P1 });
        h.advance(Duration::from_secs(2));
        h.send(SessionEvent::ReturnedToBounds { participant_id: P1 });
        h.advance(Duration::from_secs(5));
        assert_eq!(h.session.phase(), SessionPhase::Playing);

        h.send(SessionEvent::LeftBounds { participant_id: P1 });
        h.advance(Duration::from_millis(4_900));
        assert_eq!(h.session.phase(), SessionPhase::Playing);
        h.advance(Duration::from_millis(200));

        assert_eq!(h.session.phase(), SessionPhase::GameOver);
        let notes = h.drain();
        assert_eq!(
            count(&notes, |n| matches!(n, Notification::GameOver { .. })),
            1
        );
        assert_eq!(
            count(&notes, |n| matches!(
                n,
                Notification::BoundsWarning { visible: true, .. }
            )),
            2
        );
    }

    #[test]
    fn when_even_wave_clears_then_upgrade_round_pauses_time_until_both_choose() {
        let mut h = Harness::new();
        h.start_match();
        h.clear_wave();
        h.next_wave();
        h.clear_wave();

        assert!(h.session.upgrades().is_active());
        assert_eq!(h.session.time_scale(), 0.0);
        h.advance(Duration::from_secs(30));
        assert_eq!(h.session.waves().wave(), 2);

        h.send(SessionEvent::SelectUpgrade {
            participant_id: P1,
            index: 1,
        });
        h.send(SessionEvent::SelectUpgrade {
            participant_id: P1,
            index: 0,
        });
        assert!(h.session.upgrades().is_active());
        h.send(SessionEvent::SelectUpgrade {
            participant_id: P2,
            index: 1,
        });

        assert!(!h.session.upgrades().is_active());
        assert_eq!(h.session.time_scale(), 1.0);
        h.next_wave();
        assert_eq!(h.session.waves().wave(), 3);

        let notes = h.drain();
        let own_loadouts = notes
            .iter()
            .filter(|e| matches!(e.notification, Notification::LoadoutChanged(_)))
            .map(|e| e.audience)
            .collect::<Vec<_>>();
        assert_eq!(
            own_loadouts,
            vec![Audience::Participant(P1), Audience::Participant(P2)]
        );
    }

    #[test]
    fn when_upgrade_is_chosen_then_only_that_loadout_changes() {
        let mut h = Harness::new();
        h.start_match();
        h.clear_wave();
        h.next_wave();
        h.clear_wave();
        let index = h
            .session
            .upgrades()
            .offered()
            .iter()
            .position(|u| u.name != "Spreadshot")
            .expect("a multiplier upgrade is offered");

        h.send(SessionEvent::SelectUpgrade {
            participant_id: P1,
            index,
        });

        let p1 = h.session.roster().get(P1).expect("P1 present").loadout.clone();
        let p2 = h.session.roster().get(P2).expect("P2 present").loadout.clone();
        assert_ne!(p1, p2);
    }

    #[test]
    fn when_other_player_disconnects_during_round_then_round_completes() {
        let mut h = Harness::new();
        h.start_match();
        h.clear_wave();
        h.next_wave();
        h.clear_wave();

        h.send(SessionEvent::SelectUpgrade {
            participant_id: P1,
            index: 0,
        });
        assert!(h.session.upgrades().is_active());
        h.send(SessionEvent::Leave { participant_id: P2 });

        assert!(!h.session.upgrades().is_active());
        assert_eq!(h.session.time_scale(), 1.0);
    }

    #[test]
    fn when_player_disconnects_while_out_of_bounds_then_countdown_is_dropped() {
        let mut h = Harness::new();
        h.start_match();

        h.send(SessionEvent::LeftBounds { participant_id: P1 });
        h.send(SessionEvent::Leave { participant_id: P1 });
        h.advance(Duration::from_secs(10));

        assert_eq!(h.session.phase(), SessionPhase::Playing);
        assert!(!h.session.bounds().is_outside(P1));
    }

    #[test]
    fn when_player_leaves_mid_match_then_slot_stays_reserved() {
        let mut h = Harness::new();
        h.start_match();
        let slot = h.session.roster().slot_of(P2).expect("P2 has a slot");

        h.send(SessionEvent::Leave { participant_id: P2 });
        h.send(SessionEvent::Join { participant_id: 303 });
        h.send(SessionEvent::Ready {
            participant_id: 303,
            display_name: "Late".to_string(),
        });

        assert_eq!(h.session.roster().slot_of(303), None);
        assert_eq!(h.session.lives().lives(slot), Some(3));
    }

    #[test]
    fn when_upgrade_period_is_one_then_every_cleared_wave_opens_a_round() {
        let mut tuning = GameTuning::default();
        tuning.waves.base_enemies = 1;
        tuning.upgrades.every_waves = 1;
        let mut h = Harness::with_tuning(tuning);
        h.start_match();

        h.clear_wave();

        assert!(h.session.upgrades().is_active());
    }

    fn replicated_enemy_ids(session: &Session) -> Vec<EnemyId> {
        session
            .replicas()
            .snapshot()
            .into_iter()
            .find_map(|update| match update.value {
                StateValue::Enemies(list) => Some(list.iter().map(|e| e.enemy_id).collect()),
                _ => None,
            })
            .expect("enemies are replicated")
    }

    #[test]
    fn when_notifications_lag_then_snapshot_still_lists_every_live_enemy() {
        let mut tuning = GameTuning::default();
        tuning.waves.base_enemies = 3;
        let mut h = Harness::with_capacity(tuning, 4);
        h.start_match();
        for _ in 0..3 {
            h.advance(Duration::from_millis(500));
        }

        let mut lagged = false;
        loop {
            match h.notes.try_recv() {
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(_)) => lagged = true,
                Err(_) => break,
            }
        }

        assert!(lagged);
        let live = h.session.enemy_ids();
        assert_eq!(live.len(), 3);
        assert_eq!(replicated_enemy_ids(&h.session), live);
    }

    #[test]
    fn when_enemy_dies_then_replicated_list_drops_it() {
        let mut h = Harness::new();
        h.start_match();
        h.advance(Duration::from_millis(500));
        let live = h.session.enemy_ids();
        assert_eq!(live.len(), 2);

        h.send(SessionEvent::EnemyKilled {
            participant_id: P1,
            enemy_id: live[0],
        });

        assert_eq!(replicated_enemy_ids(&h.session), vec![live[1]]);
    }

    #[test]
    fn when_kill_names_an_unknown_enemy_then_wave_and_live_enemies_are_untouched() {
        let mut h = Harness::new();
        h.start_match();
        h.advance(Duration::from_millis(500));
        let live = h.session.enemy_ids();
        h.send(SessionEvent::EnemyKilled {
            participant_id: P1,
            enemy_id: live[0],
        });

        h.send(SessionEvent::EnemyKilled {
            participant_id: P2,
            enemy_id: 999,
        });

        assert_eq!(h.session.waves().killed(), 1);
        assert_eq!(h.session.lives().score(), 15);
        assert_eq!(h.session.enemy_ids(), vec![live[1]]);
    }
}
