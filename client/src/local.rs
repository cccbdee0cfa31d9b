use office_shared::config::SpawnPoint;
use office_shared::participant::{ParticipantId, ParticipantState};

/// The avatar this client drives. Its identity is only known once the relay
/// has sent `identity-assigned`.
#[derive(Debug, Clone)]
pub struct LocalParticipant {
    id: Option<ParticipantId>,
    pub state: ParticipantState,
}

impl LocalParticipant {
    pub fn new(spawn: SpawnPoint) -> Self {
        Self {
            id: None,
            state: ParticipantState::spawn(spawn),
        }
    }

    pub fn id(&self) -> Option<&ParticipantId> {
        self.id.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    /// Returns the identity this replaces, if any.
    pub fn bind_identity(&mut self, id: ParticipantId) -> Option<ParticipantId> {
        self.id.replace(id)
    }

    pub fn unbind(&mut self) -> Option<ParticipantId> {
        self.id.take()
    }

    pub fn is_self(&self, id: &ParticipantId) -> bool {
        self.id.as_ref() == Some(id)
    }
}
