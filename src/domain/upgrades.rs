// Upgrade gate: a barrier that offers a bounded choice set between waves and
// collects at most one selection per participant.

use crate::domain::catalog::UpgradeDef;
use crate::domain::errors::SelectionRejected;
use crate::domain::participant::{ParticipantId, Slot};
use crate::domain::replicated::{ReplicaHandle, Replicated};
use crate::domain::tuning::UpgradeTuning;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
pub struct UpgradeGate {
    tuning: UpgradeTuning,
    catalog: Arc<[UpgradeDef]>,
    offered: Vec<UpgradeDef>,
    chosen: HashSet<ParticipantId>,
    phase: Replicated<bool>,
    options: Replicated<Vec<String>>,
    choices: Vec<Replicated<String>>,
}

#[derive(Debug, Clone)]
pub struct UpgradeReplicas {
    pub phase: ReplicaHandle<bool>,
    pub options: ReplicaHandle<Vec<String>>,
    /// Indexed by slot.
    pub choices: Vec<ReplicaHandle<String>>,
}

impl UpgradeGate {
    pub fn new(catalog: Arc<[UpgradeDef]>, tuning: UpgradeTuning, slots: usize) -> Self {
        Self {
            tuning,
            catalog,
            offered: Vec::new(),
            chosen: HashSet::new(),
            phase: Replicated::new("upgrade_phase", false),
            options: Replicated::new("upgrade_options", Vec::new()),
            choices: (0..slots)
                .map(|_| Replicated::new("upgrade_choice", String::new()))
                .collect(),
        }
    }

    pub fn replicas(&self) -> UpgradeReplicas {
        UpgradeReplicas {
            phase: self.phase.handle(),
            options: self.options.handle(),
            choices: self.choices.iter().map(Replicated::handle).collect(),
        }
    }

    pub fn should_trigger(&self, wave: u32) -> bool {
        wave > 0 && wave % self.tuning.every_waves == 0
    }

    pub fn is_active(&self) -> bool {
        *self.phase.get()
    }

    pub fn offered(&self) -> &[UpgradeDef] {
        &self.offered
    }

    /// Opens a round with up to `options_per_round` distinct upgrades.
    /// Returns the offered names, or `None` when there is nothing to offer.
    pub fn start_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Vec<String>> {
        if self.catalog.is_empty() {
            return None;
        }

        let mut pool: Vec<&UpgradeDef> = self.catalog.iter().collect();
        pool.shuffle(rng);
        self.offered = pool
            .into_iter()
            .take(self.tuning.options_per_round)
            .cloned()
            .collect();

        let names: Vec<String> = self.offered.iter().map(|u| u.name.clone()).collect();
        self.chosen.clear();
        for choice in &mut self.choices {
            choice.set(String::new());
        }
        self.options.set(names.clone());
        self.phase.set(true);

        tracing::info!(options = ?names, "upgrade round started");
        Some(names)
    }

    /// Records one participant's pick and returns the upgrade to apply.
    pub fn select(
        &mut self,
        participant: ParticipantId,
        slot: Option<Slot>,
        index: usize,
    ) -> Result<UpgradeDef, SelectionRejected> {
        if !self.is_active() {
            return Err(SelectionRejected::PhaseInactive);
        }
        let slot = slot.ok_or(SelectionRejected::NotAPlayer)?;
        let upgrade = self
            .offered
            .get(index)
            .cloned()
            .ok_or(SelectionRejected::IndexOutOfRange {
                index,
                options: self.offered.len(),
            })?;
        if !self.chosen.insert(participant) {
            return Err(SelectionRejected::AlreadyChosen);
        }

        if let Some(choice) = self.choices.get_mut(slot.index()) {
            choice.set(upgrade.name.clone());
        }
        Ok(upgrade)
    }

    /// True once enough live participants have chosen. An empty session never blocks.
    pub fn is_complete(&self, live_participants: usize) -> bool {
        let required = self.tuning.max_required_choices.min(live_participants);
        self.chosen.len() >= required
    }

    pub fn end_round(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.phase.set(false);
        self.offered.clear();
        tracing::info!(chosen = self.chosen.len(), "upgrade round ended");
        true
    }

    pub fn forget(&mut self, participant: ParticipantId) {
        self.chosen.remove(&participant);
    }
}
