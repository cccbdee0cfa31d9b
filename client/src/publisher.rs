use std::time::{Duration, Instant};

use office_shared::participant::{ParticipantId, ParticipantState};
use office_shared::protocol::{ClientMsg, MoveMsg};

use crate::connection::Transport;
use crate::local::LocalParticipant;

/// When the local avatar is worth putting on the wire.
///
/// The default publishes on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishPolicy {
    /// Skip ticks closer together than this.
    pub min_interval: Duration,
    /// Skip a tick whose snapshot equals the last one sent.
    pub only_on_change: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    TransportClosed,
    AwaitingIdentity,
    Coalesced,
    Unchanged,
}

/// Sends the local avatar's snapshot as `move` once per tick.
#[derive(Debug, Default)]
pub struct Publisher {
    policy: PublishPolicy,
    last: Option<Sent>,
}

#[derive(Debug)]
struct Sent {
    identity: ParticipantId,
    at: Instant,
    state: ParticipantState,
}

impl Publisher {
    pub fn new(policy: PublishPolicy) -> Self {
        Self { policy, last: None }
    }

    pub fn policy(&self) -> PublishPolicy {
        self.policy
    }

    pub fn publish(
        &mut self,
        local: &LocalParticipant,
        transport: &impl Transport,
        now: Instant,
    ) -> PublishOutcome {
        if !transport.is_open() {
            self.last = None;
            return PublishOutcome::TransportClosed;
        }
        let Some(identity) = local.id() else {
            self.last = None;
            return PublishOutcome::AwaitingIdentity;
        };

        // Same identity as the last send: the policy may hold this one back.
        if let Some(last) = self.last.as_ref().filter(|last| &last.identity == identity) {
            if now.saturating_duration_since(last.at) < self.policy.min_interval {
                return PublishOutcome::Coalesced;
            }
            if self.policy.only_on_change && last.state == local.state {
                return PublishOutcome::Unchanged;
            }
        }

        transport.send(ClientMsg::Move(MoveMsg::from_state(&local.state)));
        self.last = Some(Sent {
            identity: identity.clone(),
            at: now,
            state: local.state.clone(),
        });
        PublishOutcome::Published
    }
}
