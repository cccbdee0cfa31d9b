//! End-to-end sessions against a real relay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use office_client::config::ClientConfig;
use office_client::connection::{ConnectionState, NetEvent, ServerConnection};
use office_client::presenter::Presenter;
use office_client::publisher::PublishOutcome;
use office_client::reconciler::{Applied, Ignored};
use office_client::session::ClientSession;
use office_server::config::ServerConfig;
use office_shared::config::SpawnPoint;
use office_shared::participant::{ParticipantId, ParticipantState};
use office_shared::protocol::{ContentKind, MovedMsg, ServerMsg};
use tokio::net::TcpListener;
use tokio::sync::Notify;

const SPAWN: SpawnPoint = SpawnPoint { x: 10.0, y: 20.0 };

#[derive(Debug, Default)]
struct Recorder {
    spawned: Vec<ParticipantId>,
    despawned: Vec<ParticipantId>,
    content: Vec<(ContentKind, Option<ParticipantId>, String)>,
}

impl Presenter for Recorder {
    type Handle = ParticipantId;

    fn show_identity(&mut self, _id: &ParticipantId) {}

    fn spawn(&mut self, id: &ParticipantId, _state: &ParticipantState) -> ParticipantId {
        self.spawned.push(id.clone());
        id.clone()
    }

    fn update(&mut self, _handle: &mut ParticipantId, _state: &ParticipantState) {}

    fn despawn(&mut self, id: &ParticipantId, _handle: ParticipantId) {
        self.despawned.push(id.clone());
    }

    fn show_content(&mut self, kind: ContentKind, from: Option<&ParticipantId>, data: &str) {
        self.content.push((kind, from.cloned(), data.to_string()));
    }
}

type Session = ClientSession<Recorder>;

async fn start_test_server() -> String {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        spawn: SPAWN,
        rng_seed: Some(777),
        ..Default::default()
    };
    let listener = TcpListener::bind(&config.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = office_server::app(&config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{}/ws", addr)
}

fn join(url: &str) -> Session {
    let config = ClientConfig::new(url).unwrap();
    ClientSession::new(
        ServerConnection::connect(&config),
        Recorder::default(),
        SPAWN,
        config.publish,
    )
}

/// Pump `session` until `done` holds or five seconds pass.
async fn pump_until(session: &mut Session, mut done: impl FnMut(&Session) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        session.pump();
        if done(session) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn join_with_identity(url: &str) -> (Session, ParticipantId) {
    let mut session = join(url);
    assert!(pump_until(&mut session, |s| s.local().is_bound()).await);
    let id = session.local().id().cloned().unwrap();
    (session, id)
}

#[tokio::test(flavor = "multi_thread")]
async fn two_participants_see_each_other_move_and_leave() {
    let url = start_test_server().await;

    let (mut a, a_id) = join_with_identity(&url).await;
    let (mut b, b_id) = join_with_identity(&url).await;
    assert_ne!(a_id, b_id);
    assert_eq!(a.connection_state(), ConnectionState::Connected);

    // A hears B join at the spawn point; B learns about A from catch-up.
    assert!(pump_until(&mut a, |s| s.remotes().contains(&b_id)).await);
    let b_seen = a.remotes().get(&b_id).unwrap();
    assert_eq!((b_seen.state.x, b_seen.state.y), (10.0, 20.0));
    assert!(pump_until(&mut b, |s| s.remotes().contains(&a_id)).await);

    // A walks; B sees the full snapshot.
    {
        let state = &mut a.local_mut().state;
        state.x = 30.0;
        state.y = 40.0;
        state.anim = "faune-run-down".to_string();
        state.flip_x = false;
    }
    assert_eq!(a.tick(Instant::now()), PublishOutcome::Published);
    assert!(
        pump_until(&mut b, |s| {
            s.remotes()
                .get(&a_id)
                .is_some_and(|r| r.state.x == 30.0 && r.state.y == 40.0)
        })
        .await
    );
    let a_seen = b.remotes().get(&a_id).unwrap();
    assert_eq!(a_seen.state.anim, "faune-run-down");
    assert!(!a_seen.state.flip_x);

    // B leaves.
    drop(b);
    assert!(pump_until(&mut a, |s| !s.remotes().contains(&b_id)).await);
    assert_eq!(a.presenter().despawned, vec![b_id.clone()]);

    // A stray update for B after its departure must not bring it back.
    let late = ServerMsg::Moved(MovedMsg {
        id: b_id.clone(),
        x: 50.0,
        y: 50.0,
        anim: "faune-run-up".to_string(),
        flip_x: false,
    });
    assert_eq!(
        a.handle_event(NetEvent::Message(late)),
        Some(Applied::Ignored(Ignored::UnknownParticipant))
    );
    assert!(a.remotes().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn own_identity_never_appears_remotely() {
    let url = start_test_server().await;
    let (mut a, a_id) = join_with_identity(&url).await;
    let (mut b, b_id) = join_with_identity(&url).await;

    for _ in 0..5 {
        a.tick(Instant::now());
        b.tick(Instant::now());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(pump_until(&mut a, |s| s.remotes().contains(&b_id)).await);
    assert!(pump_until(&mut b, |s| s.remotes().contains(&a_id)).await);

    assert!(!a.remotes().contains(&a_id));
    assert!(!b.remotes().contains(&b_id));
    assert_eq!(a.presenter().spawned, vec![b_id]);
    assert_eq!(b.presenter().spawned, vec![a_id]);
}

#[tokio::test(flavor = "multi_thread")]
async fn whiteboard_reaches_peers_with_sender() {
    let url = start_test_server().await;
    let (a, a_id) = join_with_identity(&url).await;
    let (mut b, _) = join_with_identity(&url).await;

    assert!(a.send_content(ContentKind::Whiteboard, "data:image/png;base64,AAAA".to_string()));
    assert!(pump_until(&mut b, |s| !s.presenter().content.is_empty()).await);

    let (kind, from, data) = &b.presenter().content[0];
    assert_eq!(*kind, ContentKind::Whiteboard);
    assert_eq!(from.as_ref(), Some(&a_id));
    assert_eq!(data, "data:image/png;base64,AAAA");
}

// === Scripted relays ===

/// Serve `router` on an ephemeral port and return its WebSocket URL.
async fn serve_scripted(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("ws://{}/ws", addr)
}

fn join_quickly(url: &str) -> Session {
    let mut config = ClientConfig::new(url).unwrap();
    config.reconnect_initial = Duration::from_millis(50);
    config.reconnect_max = Duration::from_millis(200);
    ClientSession::new(
        ServerConnection::connect(&config),
        Recorder::default(),
        SPAWN,
        config.publish,
    )
}

async fn send_frames(socket: &mut WebSocket, frames: &[&str]) -> bool {
    for frame in frames {
        if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
            return false;
        }
    }
    true
}

async fn read_until_closed(socket: &mut WebSocket) {
    while let Some(Ok(_)) = socket.recv().await {}
}

async fn garbage_then_valid(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket| async move {
        let frames = [
            "not valid json",
            r#"{"type":"teleported","id":"X"}"#,
            r#"{"type":"joined","id":"B1"}"#,
            r#"{"type":"identity-assigned","id":"A1"}"#,
            r#"{"type":"joined","id":"B1","x":1,"y":2}"#,
        ];
        if send_frames(&mut socket, &frames).await {
            read_until_closed(&mut socket).await;
        }
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_frames_are_skipped() {
    let url = serve_scripted(Router::new().route("/ws", get(garbage_then_valid))).await;
    let mut session = join_quickly(&url);

    let b1 = ParticipantId::new("B1");
    assert!(pump_until(&mut session, |s| s.remotes().contains(&b1)).await);
    assert_eq!(session.local().id(), Some(&ParticipantId::new("A1")));
    let b = session.remotes().get(&b1).unwrap();
    assert_eq!((b.state.x, b.state.y), (1.0, 2.0));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
}

/// First connection gets a peer and is cut when `kick` fires; later ones
/// get a fresh identity and an empty office.
#[derive(Clone)]
struct Flaky {
    connections: Arc<AtomicUsize>,
    kick: Arc<Notify>,
}

async fn flaky_relay(ws: WebSocketUpgrade, State(flaky): State<Flaky>) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        if flaky.connections.fetch_add(1, Ordering::SeqCst) == 0 {
            let frames = [
                r#"{"type":"identity-assigned","id":"first"}"#,
                r#"{"type":"joined","id":"peer","x":5,"y":6}"#,
            ];
            if send_frames(&mut socket, &frames).await {
                tokio::select! {
                    _ = flaky.kick.notified() => {}
                    _ = read_until_closed(&mut socket) => {}
                }
            }
            // Dropping the socket cuts the connection.
        } else if send_frames(&mut socket, &[r#"{"type":"identity-assigned","id":"second"}"#]).await {
            read_until_closed(&mut socket).await;
        }
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_rebinds_identity_on_a_clean_table() {
    let flaky = Flaky {
        connections: Arc::new(AtomicUsize::new(0)),
        kick: Arc::new(Notify::new()),
    };
    let router = Router::new()
        .route("/ws", get(flaky_relay))
        .with_state(flaky.clone());
    let url = serve_scripted(router).await;
    let mut session = join_quickly(&url);

    let peer = ParticipantId::new("peer");
    assert!(pump_until(&mut session, |s| s.remotes().contains(&peer)).await);
    assert_eq!(session.local().id(), Some(&ParticipantId::new("first")));

    flaky.kick.notify_one();

    let second = ParticipantId::new("second");
    assert!(pump_until(&mut session, |s| s.local().id() == Some(&second)).await);
    assert!(session.remotes().is_empty());
    assert_eq!(session.presenter().despawned, vec![peer]);
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(flaky.connections.load(Ordering::SeqCst), 2);
    assert_eq!(session.tick(Instant::now()), PublishOutcome::Published);
}
