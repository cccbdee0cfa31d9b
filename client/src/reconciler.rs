use std::collections::HashMap;

use office_shared::participant::{ParticipantId, ParticipantState};
use office_shared::protocol::{ContentKind, ServerMsg};

use crate::local::LocalParticipant;
use crate::presenter::Presenter;

/// What applying one inbound message did to the remote table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    IdentityBound(ParticipantId),
    Spawned(ParticipantId),
    Updated(ParticipantId),
    Despawned(ParticipantId),
    Content(ContentKind),
    Ignored(Ignored),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// `joined`/`moved` about ourselves.
    SelfReference,
    /// `joined` for someone already on screen.
    AlreadyPresent,
    /// `moved`/`left` for someone never seen or already gone.
    UnknownParticipant,
}

/// A mirrored avatar and its on-screen representation.
#[derive(Debug)]
pub struct RemoteParticipant<H> {
    pub state: ParticipantState,
    pub handle: H,
}

/// Mirror of every other participant, driven by the relay's broadcasts.
///
/// Each remote identity is absent, then present after `joined`, then absent
/// again after `left`. Messages that don't fit that lifecycle are no-ops,
/// so duplicates and stragglers are harmless. The local identity never
/// appears in the table.
#[derive(Debug)]
pub struct Reconciler<H> {
    remotes: HashMap<ParticipantId, RemoteParticipant<H>>,
}

impl<H> Default for Reconciler<H> {
    fn default() -> Self {
        Self {
            remotes: HashMap::new(),
        }
    }
}

impl<H> Reconciler<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply<P>(
        &mut self,
        msg: ServerMsg,
        local: &mut LocalParticipant,
        presenter: &mut P,
    ) -> Applied
    where
        P: Presenter<Handle = H>,
    {
        let applied = match msg {
            ServerMsg::IdentityAssigned(assigned) => {
                let id = assigned.id;
                // We can't be our own remote.
                if let Some(stale) = self.remotes.remove(&id) {
                    presenter.despawn(&id, stale.handle);
                }
                if let Some(previous) = local.bind_identity(id.clone()) {
                    if previous != id {
                        tracing::info!("Identity changed {} -> {}", previous.short(), id.short());
                    }
                }
                presenter.show_identity(&id);
                Applied::IdentityBound(id)
            }
            ServerMsg::Joined(joined) => {
                let state = joined.state();
                let id = joined.id;
                if local.is_self(&id) {
                    Applied::Ignored(Ignored::SelfReference)
                } else if self.remotes.contains_key(&id) {
                    Applied::Ignored(Ignored::AlreadyPresent)
                } else {
                    let handle = presenter.spawn(&id, &state);
                    self.remotes
                        .insert(id.clone(), RemoteParticipant { state, handle });
                    Applied::Spawned(id)
                }
            }
            ServerMsg::Moved(moved) => {
                if local.is_self(&moved.id) {
                    Applied::Ignored(Ignored::SelfReference)
                } else {
                    match self.remotes.get_mut(&moved.id) {
                        Some(remote) => {
                            remote.state = moved.state();
                            presenter.update(&mut remote.handle, &remote.state);
                            Applied::Updated(moved.id)
                        }
                        None => Applied::Ignored(Ignored::UnknownParticipant),
                    }
                }
            }
            ServerMsg::Left(left) => match self.remotes.remove(&left.id) {
                Some(remote) => {
                    presenter.despawn(&left.id, remote.handle);
                    Applied::Despawned(left.id)
                }
                None => Applied::Ignored(Ignored::UnknownParticipant),
            },
            ServerMsg::Whiteboard(content) => {
                presenter.show_content(ContentKind::Whiteboard, content.id.as_ref(), &content.data);
                Applied::Content(ContentKind::Whiteboard)
            }
            ServerMsg::Laptop(content) => {
                presenter.show_content(ContentKind::Laptop, content.id.as_ref(), &content.data);
                Applied::Content(ContentKind::Laptop)
            }
        };

        if let Applied::Ignored(reason) = &applied {
            tracing::debug!("Ignored inbound message: {:?}", reason);
        }
        applied
    }

    /// Forget everyone. Used when the connection drops, since a new
    /// connection brings a new identity and a fresh catch-up.
    pub fn reset<P>(&mut self, local: &mut LocalParticipant, presenter: &mut P)
    where
        P: Presenter<Handle = H>,
    {
        for (id, remote) in self.remotes.drain() {
            presenter.despawn(&id, remote.handle);
        }
        local.unbind();
        presenter.connection_lost();
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&RemoteParticipant<H>> {
        self.remotes.get(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.remotes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &RemoteParticipant<H>)> {
        self.remotes.iter()
    }
}
