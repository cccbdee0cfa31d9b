use std::collections::HashMap;

use office_shared::config::SpawnPoint;
use office_shared::participant::{ParticipantId, ParticipantState};
use office_shared::protocol::{
    ContentKind, IdentityAssignedMsg, JoinedMsg, LeftMsg, MoveMsg, MovedMsg, ServerMsg,
};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::identity::IdentityAllocator;

/// One registered connection.
pub struct Session {
    pub id: ParticipantId,
    /// Last state the participant reported (spawn state until its first move).
    pub state: ParticipantState,
    has_moved: bool,
    outbound: mpsc::Sender<ServerMsg>,
}

/// Result of registering a connection.
#[derive(Debug)]
pub struct Admission {
    pub id: ParticipantId,
    /// `identity-assigned` followed by the catch-up burst.
    pub greeting: Vec<ServerMsg>,
}

/// Authoritative set of connected participants. Owned by the relay task,
/// which is the only writer.
pub struct SessionRegistry {
    sessions: HashMap<ParticipantId, Session>,
    allocator: IdentityAllocator,
    spawn: SpawnPoint,
}

impl SessionRegistry {
    pub fn new(allocator: IdentityAllocator, spawn: SpawnPoint) -> Self {
        Self {
            sessions: HashMap::new(),
            allocator,
            spawn,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn state(&self, id: &ParticipantId) -> Option<&ParticipantState> {
        self.sessions.get(id).map(|s| &s.state)
    }

    /// Register a new connection.
    ///
    /// Everyone else receives `joined`. The returned greeting starts with
    /// `identity-assigned` and continues with a catch-up burst describing
    /// everyone already present; the caller delivers it ahead of anything
    /// later queued on `outbound`. Sessions evicted while announcing the
    /// newcomer are reported to it as `left` through `outbound`.
    pub fn register(&mut self, outbound: mpsc::Sender<ServerMsg>) -> Admission {
        let sessions = &self.sessions;
        let id = self.allocator.allocate(|id| sessions.contains_key(id));

        let mut greeting = vec![ServerMsg::IdentityAssigned(IdentityAssignedMsg {
            id: id.clone(),
        })];
        for session in self.sessions.values() {
            greeting.push(ServerMsg::Joined(JoinedMsg {
                id: session.id.clone(),
                x: session.state.x,
                y: session.state.y,
            }));
            if session.has_moved {
                greeting.push(ServerMsg::Moved(MovedMsg::attributed(
                    session.id.clone(),
                    MoveMsg::from_state(&session.state),
                )));
            }
        }

        let state = ParticipantState::spawn(self.spawn);
        let joined = ServerMsg::Joined(JoinedMsg {
            id: id.clone(),
            x: state.x,
            y: state.y,
        });
        self.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                state,
                has_moved: false,
                outbound,
            },
        );
        self.fan_out(Some(&id), joined);
        Admission { id, greeting }
    }

    /// Record `id`'s new state and relay it to everyone else as `moved`.
    /// Returns false if `id` is not registered.
    pub fn relay_move(&mut self, id: &ParticipantId, msg: MoveMsg) -> bool {
        let Some(session) = self.sessions.get_mut(id) else {
            return false;
        };
        let moved = MovedMsg::attributed(id.clone(), msg);
        session.state = moved.state();
        session.has_moved = true;
        self.fan_out(Some(id), ServerMsg::Moved(moved));
        true
    }

    /// Relay panel content from `id` to everyone else.
    pub fn relay_content(&mut self, id: &ParticipantId, kind: ContentKind, data: String) -> bool {
        if !self.sessions.contains_key(id) {
            return false;
        }
        self.fan_out(Some(id), ServerMsg::content(kind, id.clone(), data));
        true
    }

    /// Remove `id` and broadcast `left`. Only the call that actually removes
    /// the session broadcasts, so `left` goes out once per identity.
    pub fn unregister(&mut self, id: &ParticipantId) -> bool {
        if self.sessions.remove(id).is_none() {
            return false;
        }
        self.fan_out(None, ServerMsg::Left(LeftMsg { id: id.clone() }));
        true
    }

    /// Queue `msg` for every session except `except`. Sessions whose queue is
    /// full or closed are evicted, and their `left` is fanned out in turn.
    fn fan_out(&mut self, except: Option<&ParticipantId>, msg: ServerMsg) {
        let mut pending = vec![(except.cloned(), msg)];
        while let Some((except, msg)) = pending.pop() {
            let mut evicted = Vec::new();
            for session in self.sessions.values() {
                if except.as_ref() == Some(&session.id) {
                    continue;
                }
                match session.outbound.try_send(msg.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Evicting {}: outbound queue full", session.id.short());
                        evicted.push(session.id.clone());
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!("Evicting {}: connection gone", session.id.short());
                        evicted.push(session.id.clone());
                    }
                }
            }
            for id in evicted {
                if self.sessions.remove(&id).is_some() {
                    pending.push((None, ServerMsg::Left(LeftMsg { id })));
                }
            }
        }
    }
}
