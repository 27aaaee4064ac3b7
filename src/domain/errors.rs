// Domain-level rejections. Every variant is a no-op for state: the request is logged
// and dropped, never applied partially.

use crate::domain::participant::ParticipantId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    UnknownParticipant(ParticipantId),
    AlreadyJoined(ParticipantId),
    InvalidDisplayName,
    SlotsFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionRejected {
    PhaseInactive,
    IndexOutOfRange { index: usize, options: usize },
    AlreadyChosen,
    NotAPlayer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillRejected {
    WaveInactive,
    UnknownEnemy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveError {
    AlreadyStarted,
}
