use std::time::Instant;

use office_shared::config::SpawnPoint;
use office_shared::protocol::ContentKind;

use crate::connection::{ConnectionState, NetEvent, ServerConnection, Transport};
use crate::local::LocalParticipant;
use crate::presenter::Presenter;
use crate::publisher::{PublishOutcome, PublishPolicy, Publisher};
use crate::reconciler::{Applied, Reconciler};

/// One client's view of the office: the connection, our avatar, and
/// everyone else's.
///
/// Driven by a cooperative tick: [`ClientSession::pump`] applies whatever
/// arrived since the last tick, then [`ClientSession::tick`] publishes.
pub struct ClientSession<P: Presenter> {
    connection: ServerConnection,
    presenter: P,
    local: LocalParticipant,
    remotes: Reconciler<P::Handle>,
    publisher: Publisher,
}

impl<P: Presenter> ClientSession<P> {
    pub fn new(
        connection: ServerConnection,
        presenter: P,
        spawn: SpawnPoint,
        policy: PublishPolicy,
    ) -> Self {
        Self {
            connection,
            presenter,
            local: LocalParticipant::new(spawn),
            remotes: Reconciler::new(),
            publisher: Publisher::new(policy),
        }
    }

    pub fn handle_event(&mut self, event: NetEvent) -> Option<Applied> {
        match event {
            NetEvent::Connected => {
                tracing::info!("Connected, waiting for identity");
                None
            }
            NetEvent::Disconnected => {
                self.remotes.reset(&mut self.local, &mut self.presenter);
                None
            }
            NetEvent::Message(msg) => {
                Some(self.remotes.apply(msg, &mut self.local, &mut self.presenter))
            }
        }
    }

    /// Apply everything the network thread has delivered so far.
    pub fn pump(&mut self) -> Vec<Applied> {
        self.connection
            .poll_events()
            .into_iter()
            .filter_map(|event| self.handle_event(event))
            .collect()
    }

    pub fn tick(&mut self, now: Instant) -> PublishOutcome {
        self.publisher.publish(&self.local, &self.connection, now)
    }

    /// Share panel content. Dropped when not connected.
    pub fn send_content(&self, kind: ContentKind, data: String) -> bool {
        if !self.connection.is_open() {
            return false;
        }
        self.connection.send_content(kind, data);
        true
    }

    pub fn local(&self) -> &LocalParticipant {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut LocalParticipant {
        &mut self.local
    }

    pub fn remotes(&self) -> &Reconciler<P::Handle> {
        &self.remotes
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use office_shared::protocol::ClientMsg;

    use super::*;
    use crate::connection::TestStub;
    use crate::reconciler::tests::{identity, joined, left, moved, RecordingPresenter};
    use crate::reconciler::Ignored;

    fn session() -> (ClientSession<RecordingPresenter>, TestStub) {
        let (conn, stub) = ServerConnection::test_stub();
        let session = ClientSession::new(
            conn,
            RecordingPresenter::default(),
            SpawnPoint { x: 10.0, y: 20.0 },
            PublishPolicy::default(),
        );
        (session, stub)
    }

    #[test]
    fn pump_applies_events_in_order() {
        let (mut s, stub) = session();
        stub.events.send(NetEvent::Connected).unwrap();
        stub.events.send(NetEvent::Message(identity("A1"))).unwrap();
        stub.events.send(NetEvent::Message(joined("B1", 10.0, 20.0))).unwrap();
        stub.events
            .send(NetEvent::Message(moved("B1", 30.0, 40.0, "run-down", false)))
            .unwrap();

        let applied = s.pump();
        assert_eq!(
            applied,
            vec![
                Applied::IdentityBound("A1".into()),
                Applied::Spawned("B1".into()),
                Applied::Updated("B1".into()),
            ]
        );
        assert_eq!(s.connection_state(), ConnectionState::Connected);
        assert_eq!(s.remotes().len(), 1);
    }

    #[test]
    fn tick_publishes_once_identity_and_socket_are_up() {
        let (mut s, mut stub) = session();
        let now = Instant::now();
        assert_eq!(s.tick(now), PublishOutcome::TransportClosed);

        stub.open.store(true, Ordering::Release);
        assert_eq!(s.tick(now), PublishOutcome::AwaitingIdentity);

        s.handle_event(NetEvent::Message(identity("A1")));
        s.local_mut().state.x = 30.0;
        assert_eq!(s.tick(now), PublishOutcome::Published);

        match stub.sent.try_recv().unwrap() {
            ClientMsg::Move(m) => assert_eq!((m.x, m.y), (30.0, 20.0)),
            other => panic!("Expected Move, got {:?}", other),
        }
    }

    #[test]
    fn disconnect_resets_remote_table() {
        let (mut s, _stub) = session();
        s.handle_event(NetEvent::Message(identity("A1")));
        s.handle_event(NetEvent::Message(joined("B1", 1.0, 1.0)));

        assert_eq!(s.handle_event(NetEvent::Disconnected), None);
        assert!(s.remotes().is_empty());
        assert!(!s.local().is_bound());
        assert_eq!(s.presenter().calls.last().unwrap(), "connection lost");
    }

    #[test]
    fn late_moved_after_left_is_ignored() {
        let (mut s, _stub) = session();
        s.handle_event(NetEvent::Message(identity("A1")));
        s.handle_event(NetEvent::Message(joined("B1", 1.0, 1.0)));
        s.handle_event(NetEvent::Message(left("B1")));
        assert_eq!(
            s.handle_event(NetEvent::Message(moved("B1", 2.0, 2.0, "run", false))),
            Some(Applied::Ignored(Ignored::UnknownParticipant))
        );
    }

    #[test]
    fn content_needs_open_socket() {
        let (s, mut stub) = session();
        assert!(!s.send_content(ContentKind::Whiteboard, "x".to_string()));
        assert!(stub.sent.try_recv().is_err());

        stub.open.store(true, Ordering::Release);
        assert!(s.send_content(ContentKind::Whiteboard, "x".to_string()));
        assert!(matches!(stub.sent.try_recv(), Ok(ClientMsg::Whiteboard(_))));
    }
}
