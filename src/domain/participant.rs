// Connected participants, their stable player slots and readiness.

use crate::domain::errors::RosterError;
use crate::domain::loadout::Loadout;
use crate::domain::spawn::Position;

pub type ParticipantId = u64;

/// Zero-based player slot. Slot 0 is "Player 1" in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(usize);

impl Slot {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// One-based number shown to players.
    pub fn number(self) -> usize {
        self.0 + 1
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: Option<String>,
    pub ready: bool,
    /// Assigned on first ready and kept for the whole session.
    pub slot: Option<Slot>,
    pub position: Position,
    pub loadout: Loadout,
}

/// Outcome of a ready toggle, reported back to the participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyChange {
    pub slot: Slot,
    pub ready: bool,
    pub display_name: String,
}

#[derive(Debug)]
pub struct Roster {
    participants: Vec<Participant>,
    slots: Vec<Option<ParticipantId>>,
    starting_loadout: Loadout,
}

impl Roster {
    pub fn new(max_players: usize, starting_loadout: Loadout) -> Self {
        Self {
            participants: Vec::new(),
            slots: vec![None; max_players],
            starting_loadout,
        }
    }

    pub fn join(&mut self, id: ParticipantId) -> Result<(), RosterError> {
        if self.get(id).is_some() {
            return Err(RosterError::AlreadyJoined(id));
        }
        self.participants.push(Participant {
            id,
            display_name: None,
            ready: false,
            slot: None,
            position: Position::ORIGIN,
            loadout: self.starting_loadout.clone(),
        });
        Ok(())
    }

    /// Removes a participant. With `release_slot` the slot becomes claimable again;
    /// otherwise it stays reserved so slot numbering never shifts mid-match.
    pub fn leave(&mut self, id: ParticipantId, release_slot: bool) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        let participant = self.participants.remove(index);
        if release_slot {
            if let Some(slot) = participant.slot {
                self.slots[slot.index()] = None;
            }
        }
        Some(participant)
    }

    /// Flips readiness. The first ready claims the lowest free slot.
    pub fn toggle_ready(
        &mut self,
        id: ParticipantId,
        display_name: &str,
    ) -> Result<ReadyChange, RosterError> {
        let display_name = validate_display_name(display_name)?;
        let current_slot = self
            .get(id)
            .ok_or(RosterError::UnknownParticipant(id))?
            .slot;

        let slot = match current_slot {
            Some(slot) => slot,
            None => {
                let free = self
                    .slots
                    .iter()
                    .position(Option::is_none)
                    .ok_or(RosterError::SlotsFull)?;
                self.slots[free] = Some(id);
                Slot::new(free)
            }
        };

        let participant = self
            .get_mut(id)
            .ok_or(RosterError::UnknownParticipant(id))?;
        participant.slot = Some(slot);
        participant.ready = !participant.ready;
        if participant.ready {
            participant.display_name = Some(display_name.clone());
        }

        Ok(ReadyChange {
            slot,
            ready: participant.ready,
            display_name: participant.display_name.clone().unwrap_or(display_name),
        })
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    pub fn slot_of(&self, id: ParticipantId) -> Option<Slot> {
        self.get(id).and_then(|p| p.slot)
    }

    /// Connected participants holding a slot.
    pub fn players(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.slot.is_some())
    }

    pub fn player_count(&self) -> usize {
        self.players().count()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn all_players_ready(&self, min_players: usize) -> bool {
        let players: Vec<_> = self.players().collect();
        players.len() >= min_players && players.iter().all(|p| p.ready)
    }

    pub fn anchors(&self) -> Vec<Position> {
        self.players().map(|p| p.position).collect()
    }
}

fn validate_display_name(value: &str) -> Result<String, RosterError> {
    // Keep names compact for the HUD.
    const MAX_LEN: usize = 24;

    let value = value.trim();
    if value.is_empty() || value.chars().count() > MAX_LEN {
        return Err(RosterError::InvalidDisplayName);
    }
    if value.chars().any(char::is_control) {
        return Err(RosterError::InvalidDisplayName);
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fixtures::blaster;

    fn roster() -> Roster {
        Roster::new(2, Loadout::new(5.0, blaster()))
    }

    #[test]
    fn when_players_ready_up_then_slots_follow_ready_order() {
        let mut roster = roster();
        roster.join(10).unwrap();
        roster.join(20).unwrap();

        let second = roster.toggle_ready(20, "Bea").unwrap();
        let first = roster.toggle_ready(10, "Al").unwrap();

        assert_eq!(second.slot, Slot::new(0));
        assert_eq!(first.slot, Slot::new(1));
        assert!(roster.all_players_ready(2));
    }

    #[test]
    fn when_player_unreadies_then_slot_is_kept() {
        let mut roster = roster();
        roster.join(1).unwrap();

        let on = roster.toggle_ready(1, "Al").unwrap();
        let off = roster.toggle_ready(1, "Al").unwrap();

        assert!(on.ready);
        assert!(!off.ready);
        assert_eq!(on.slot, off.slot);
        assert!(!roster.all_players_ready(1));
    }

    #[test]
    fn when_all_slots_are_taken_then_returns_slots_full() {
        let mut roster = roster();
        for id in 1..=3 {
            roster.join(id).unwrap();
        }
        roster.toggle_ready(1, "A").unwrap();
        roster.toggle_ready(2, "B").unwrap();

        assert_eq!(roster.toggle_ready(3, "C"), Err(RosterError::SlotsFull));
        assert_eq!(roster.player_count(), 2);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn when_name_is_blank_then_returns_invalid_display_name() {
        let mut roster = roster();
        roster.join(1).unwrap();

        assert_eq!(
            roster.toggle_ready(1, "   "),
            Err(RosterError::InvalidDisplayName)
        );
        assert_eq!(roster.slot_of(1), None);
    }

    #[test]
    fn when_player_leaves_without_release_then_slot_stays_reserved() {
        let mut roster = roster();
        roster.join(1).unwrap();
        roster.join(2).unwrap();
        roster.join(3).unwrap();
        roster.toggle_ready(1, "A").unwrap();
        roster.toggle_ready(2, "B").unwrap();

        roster.leave(1, false);
        assert_eq!(roster.toggle_ready(3, "C"), Err(RosterError::SlotsFull));

        roster.leave(2, true);
        assert_eq!(roster.toggle_ready(3, "C").unwrap().slot, Slot::new(1));
    }

    #[test]
    fn when_same_id_joins_twice_then_returns_already_joined() {
        let mut roster = roster();
        roster.join(5).unwrap();

        assert_eq!(roster.join(5), Err(RosterError::AlreadyJoined(5)));
    }
}
