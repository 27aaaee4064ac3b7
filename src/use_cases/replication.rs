// Fans replicated session values out to connected observers.

use crate::domain::{
    LivesReplicas, Mirror, ReplicaHandle, Slot, UpgradeReplicas, Versioned, WaveReplicas,
};
use crate::use_cases::types::{EnemyView, SessionPhase, StateUpdate, StateValue};
use tokio::sync::broadcast;

/// Read-only handles to every replicated value of one session.
#[derive(Debug, Clone)]
pub struct SessionReplicas {
    pub phase: ReplicaHandle<SessionPhase>,
    pub countdown: ReplicaHandle<u32>,
    pub time_scale: ReplicaHandle<f32>,
    /// Indexed by slot.
    pub names: Vec<ReplicaHandle<String>>,
    pub waves: WaveReplicas,
    pub upgrades: UpgradeReplicas,
    pub lives: LivesReplicas,
    /// Live enemies; lets late or lagging observers rebuild the field.
    pub enemies: ReplicaHandle<Vec<EnemyView>>,
}

fn phase_value(phase: &SessionPhase) -> StateValue {
    StateValue::Text(phase.as_str().to_string())
}

fn count_value(count: &u32) -> StateValue {
    StateValue::Count(*count)
}

fn bool_value(flag: &bool) -> StateValue {
    StateValue::Bool(*flag)
}

fn scale_value(scale: &f32) -> StateValue {
    StateValue::Scale(*scale)
}

#[allow(clippy::ptr_arg)]
fn text_value(text: &String) -> StateValue {
    StateValue::Text(text.clone())
}

#[allow(clippy::ptr_arg)]
fn list_value(list: &Vec<String>) -> StateValue {
    StateValue::List(list.clone())
}

#[allow(clippy::ptr_arg)]
fn enemies_value(enemies: &Vec<EnemyView>) -> StateValue {
    StateValue::Enemies(enemies.clone())
}

fn to_update<T>(
    field: &'static str,
    slot: Option<Slot>,
    latest: Versioned<T>,
    convert: fn(&T) -> StateValue,
) -> StateUpdate {
    StateUpdate {
        field,
        slot,
        seq: latest.seq,
        value: convert(&latest.value),
    }
}

impl SessionReplicas {
    /// Current value of every replica; sent to a client on join and on lag recovery.
    pub fn snapshot(&self) -> Vec<StateUpdate> {
        let mut updates = vec![
            to_update(self.phase.field(), None, self.phase.current(), phase_value),
            to_update(self.countdown.field(), None, self.countdown.current(), count_value),
            to_update(self.time_scale.field(), None, self.time_scale.current(), scale_value),
            to_update(self.waves.wave.field(), None, self.waves.wave.current(), count_value),
            to_update(self.waves.total.field(), None, self.waves.total.current(), count_value),
            to_update(self.waves.killed.field(), None, self.waves.killed.current(), count_value),
            to_update(self.waves.active.field(), None, self.waves.active.current(), bool_value),
            to_update(self.lives.score.field(), None, self.lives.score.current(), count_value),
            to_update(
                self.upgrades.phase.field(),
                None,
                self.upgrades.phase.current(),
                bool_value,
            ),
            to_update(
                self.upgrades.options.field(),
                None,
                self.upgrades.options.current(),
                list_value,
            ),
            to_update(self.enemies.field(), None, self.enemies.current(), enemies_value),
        ];

        for (index, handle) in self.names.iter().enumerate() {
            let slot = Some(Slot::new(index));
            updates.push(to_update(handle.field(), slot, handle.current(), text_value));
        }
        for (index, handle) in self.lives.lives.iter().enumerate() {
            let slot = Some(Slot::new(index));
            updates.push(to_update(handle.field(), slot, handle.current(), count_value));
        }
        for (index, handle) in self.upgrades.choices.iter().enumerate() {
            let slot = Some(Slot::new(index));
            updates.push(to_update(handle.field(), slot, handle.current(), text_value));
        }

        updates
    }
}

/// Spawns one forwarder per replica. Each forwarder republishes changes as
/// `StateUpdate`s and exits once the session and every handle are gone.
pub fn spawn_forwarders(replicas: &SessionReplicas, state_tx: broadcast::Sender<StateUpdate>) {
    forward(replicas.phase.subscribe(), None, phase_value, state_tx.clone());
    forward(replicas.countdown.subscribe(), None, count_value, state_tx.clone());
    forward(replicas.time_scale.subscribe(), None, scale_value, state_tx.clone());
    forward(replicas.waves.wave.subscribe(), None, count_value, state_tx.clone());
    forward(replicas.waves.total.subscribe(), None, count_value, state_tx.clone());
    forward(replicas.waves.killed.subscribe(), None, count_value, state_tx.clone());
    forward(replicas.waves.active.subscribe(), None, bool_value, state_tx.clone());
    forward(replicas.lives.score.subscribe(), None, count_value, state_tx.clone());
    forward(replicas.upgrades.phase.subscribe(), None, bool_value, state_tx.clone());
    forward(replicas.upgrades.options.subscribe(), None, list_value, state_tx.clone());
    forward(replicas.enemies.subscribe(), None, enemies_value, state_tx.clone());

    for (index, handle) in replicas.names.iter().enumerate() {
        forward(handle.subscribe(), Some(Slot::new(index)), text_value, state_tx.clone());
    }
    for (index, handle) in replicas.lives.lives.iter().enumerate() {
        forward(handle.subscribe(), Some(Slot::new(index)), count_value, state_tx.clone());
    }
    for (index, handle) in replicas.upgrades.choices.iter().enumerate() {
        forward(handle.subscribe(), Some(Slot::new(index)), text_value, state_tx.clone());
    }
}

fn forward<T>(
    mut mirror: Mirror<T>,
    slot: Option<Slot>,
    convert: fn(&T) -> StateValue,
    state_tx: broadcast::Sender<StateUpdate>,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    // Subscribed before spawning so no write between here and the first poll is lost.
    tokio::spawn(async move {
        let field = mirror.field();
        while let Some(change) = mirror.changed().await {
            // No connected clients is fine.
            let _ = state_tx.send(StateUpdate {
                field,
                slot,
                seq: change.seq,
                value: convert(&change.new),
            });
        }
        tracing::debug!(field, "replica forwarder exiting");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Replicated;
    use crate::domain::catalog::fixtures::catalogs;
    use crate::domain::tuning::{UpgradeTuning, WaveTuning};
    use crate::domain::{LivesAuthority, UpgradeGate, WaveScheduler};
    use std::time::Duration;

    struct Parts {
        phase: Replicated<SessionPhase>,
        countdown: Replicated<u32>,
        time_scale: Replicated<f32>,
        names: Vec<Replicated<String>>,
        waves: WaveScheduler,
        upgrades: UpgradeGate,
        lives: LivesAuthority,
        enemies: Replicated<Vec<EnemyView>>,
    }

    fn parts() -> Parts {
        Parts {
            phase: Replicated::new("phase", SessionPhase::WaitingForPlayers),
            countdown: Replicated::new("countdown", 0),
            time_scale: Replicated::new("time_scale", 1.0),
            names: vec![Replicated::new("player_name", String::new())],
            waves: WaveScheduler::new(WaveTuning::default()),
            upgrades: UpgradeGate::new(catalogs().upgrades(), UpgradeTuning::default(), 1),
            lives: LivesAuthority::new(1, 3),
            enemies: Replicated::new("enemies", Vec::new()),
        }
    }

    fn replicas(parts: &Parts) -> SessionReplicas {
        SessionReplicas {
            phase: parts.phase.handle(),
            countdown: parts.countdown.handle(),
            time_scale: parts.time_scale.handle(),
            names: parts.names.iter().map(Replicated::handle).collect(),
            waves: parts.waves.replicas(),
            upgrades: parts.upgrades.replicas(),
            lives: parts.lives.replicas(),
            enemies: parts.enemies.handle(),
        }
    }

    #[test]
    fn when_snapshot_is_taken_then_every_value_and_slot_is_listed() {
        let mut parts = parts();
        parts.lives.add_score(15);
        let replicas = replicas(&parts);

        let snapshot = replicas.snapshot();

        assert_eq!(snapshot.len(), 14);
        let score = snapshot
            .iter()
            .find(|u| u.field == "score")
            .expect("score in snapshot");
        assert_eq!(score.value, StateValue::Count(15));
        assert_eq!(score.seq, 1);
        assert!(
            snapshot
                .iter()
                .any(|u| u.field == "lives" && u.slot == Some(Slot::new(0)))
        );
    }

    #[tokio::test]
    async fn when_value_changes_then_forwarder_publishes_state_update() {
        let mut parts = parts();
        let replicas = replicas(&parts);
        let (state_tx, mut state_rx) = broadcast::channel(16);
        spawn_forwarders(&replicas, state_tx);

        parts.phase.set(SessionPhase::Playing);

        let update = tokio::time::timeout(Duration::from_secs(1), state_rx.recv())
            .await
            .expect("forwarder should publish")
            .expect("channel open");
        assert_eq!(update.field, "phase");
        assert_eq!(update.value, StateValue::Text("playing".to_string()));
    }
}
