//! Load test for the office relay.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server and wait for their identity
//! - Random-walk around the office, sending `move` at a fixed rate
//! - Count the joined/moved/left messages fanned out to them
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 50)
//!   --duration S     Test duration in seconds (default: 30)
//!   --move-rate R    Moves per second per client (default: 20)
//!   --url URL        Server URL (default: ws://127.0.0.1:3000/ws)

use futures_util::{SinkExt, StreamExt};
use office_shared::config::DEFAULT_WS_URL;
use office_shared::protocol::{ClientMsg, MoveMsg, ServerMsg};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    messages_received: AtomicU64,
    joined_received: AtomicU64,
    moved_received: AtomicU64,
    left_received: AtomicU64,
    moves_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

// === Client task ===

impl Metrics {
    fn count_inbound(&self, text: &str) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        let counter = match ServerMsg::decode(text) {
            Ok(ServerMsg::Joined(_)) => &self.joined_received,
            Ok(ServerMsg::Moved(_)) => &self.moved_received,
            Ok(ServerMsg::Left(_)) => &self.left_received,
            Ok(_) => return,
            Err(_) => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn fail(&self, client_id: u32, what: impl std::fmt::Display) {
        // Only the first few clients are chatty.
        if client_id < 3 {
            eprintln!("client {}: {}", client_id, what);
        }
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// One step of a random walk around the office.
fn wander(rng: &mut StdRng, x: f64, y: f64) -> MoveMsg {
    let (dx, dy, anim, flip_x) = match rng.gen_range(0..5) {
        0 => (-4.0, 0.0, "faune-run-side", true),
        1 => (4.0, 0.0, "faune-run-side", false),
        2 => (0.0, -4.0, "faune-run-up", false),
        3 => (0.0, 4.0, "faune-run-down", false),
        _ => (0.0, 0.0, "faune-idle-down", false),
    };
    MoveMsg {
        x: (x + dx).clamp(0.0, 1600.0),
        y: (y + dy).clamp(0.0, 750.0),
        anim: anim.to_string(),
        flip_x,
    }
}

async fn run_client(
    client_id: u32,
    url: String,
    move_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let dialed = Instant::now();
    let mut ws = match connect_async(&url).await {
        Ok((ws, _)) => ws,
        Err(e) => return metrics.fail(client_id, e),
    };

    // Nothing is relayed for us until the relay has named us.
    let greeting = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let Some(frame) = ws.next().await else {
                return None;
            };
            match frame {
                Ok(Message::Text(text)) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    if let Ok(ServerMsg::IdentityAssigned(a)) = ServerMsg::decode(text.as_str()) {
                        return Some(a.id);
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    })
    .await;
    let Ok(Some(my_id)) = greeting else {
        return metrics.fail(client_id, "no identity-assigned");
    };

    metrics
        .latency_sum_ms
        .fetch_add(dialed.elapsed().as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);
    if client_id < 3 {
        eprintln!("client {} is {}", client_id, my_id.short());
    }

    let mut moves = tokio::time::interval(if move_rate > 0.0 {
        Duration::from_secs_f64(1.0 / move_rate)
    } else {
        duration
    });
    moves.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    let mut rng = StdRng::seed_from_u64(u64::from(client_id));
    let mut last = MoveMsg {
        x: 250.0,
        y: 300.0,
        anim: String::new(),
        flip_x: false,
    };

    loop {
        tokio::select! {
            _ = &mut deadline => break,

            _ = moves.tick(), if move_rate > 0.0 => {
                last = wander(&mut rng, last.x, last.y);
                let Ok(json) = ClientMsg::Move(last.clone()).encode() else {
                    continue;
                };
                if let Err(e) = ws.send(Message::Text(json.into())).await {
                    metrics.fail(client_id, e);
                    break;
                }
                metrics.moves_sent.fetch_add(1, Ordering::Relaxed);
            }

            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => metrics.count_inbound(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    metrics.fail(client_id, format!("closed by relay: {:?}", frame));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    metrics.fail(client_id, e);
                    break;
                }
                None => break,
            },
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

struct Options {
    clients: u32,
    duration: Duration,
    move_rate: f64,
    url: String,
}

impl Options {
    fn from_args(mut args: impl Iterator<Item = String>) -> Self {
        let mut opts = Self {
            clients: 50,
            duration: Duration::from_secs(30),
            move_rate: 20.0,
            url: DEFAULT_WS_URL.to_string(),
        };
        while let Some(flag) = args.next() {
            let value = args.next();
            match (flag.as_str(), value) {
                ("--clients", Some(v)) => opts.clients = v.parse().unwrap_or(opts.clients),
                ("--duration", Some(v)) => {
                    if let Ok(secs) = v.parse() {
                        opts.duration = Duration::from_secs(secs);
                    }
                }
                ("--move-rate", Some(v)) => opts.move_rate = v.parse().unwrap_or(opts.move_rate),
                ("--url", Some(v)) => opts.url = v,
                (other, _) => eprintln!("Ignoring argument {}", other),
            }
        }
        opts
    }
}

impl Metrics {
    fn line(&self) -> String {
        format!(
            "connected={} msgs={} joined={} moved={} left={} sent={} errors={}",
            self.connected.load(Ordering::Relaxed),
            self.messages_received.load(Ordering::Relaxed),
            self.joined_received.load(Ordering::Relaxed),
            self.moved_received.load(Ordering::Relaxed),
            self.left_received.load(Ordering::Relaxed),
            self.moves_sent.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}

#[tokio::main]
async fn main() {
    let opts = Options::from_args(std::env::args().skip(1));

    println!(
        "office loadtest: {} clients x {:.0} moves/s for {:?} against {}",
        opts.clients, opts.move_rate, opts.duration, opts.url
    );

    let metrics = Arc::new(Metrics::default());
    let started = Instant::now();
    let mut clients = tokio::task::JoinSet::new();

    for client_id in 0..opts.clients {
        clients.spawn(run_client(
            client_id,
            opts.url.clone(),
            opts.move_rate,
            opts.duration,
            Arc::clone(&metrics),
        ));
        // Join in batches so the relay isn't hit by one burst.
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
    println!("spawned in {:?}", started.elapsed());

    let reporter = {
        let metrics = Arc::clone(&metrics);
        tokio::spawn(async move {
            let mut every = tokio::time::interval(Duration::from_secs(5));
            every.tick().await;
            loop {
                every.tick().await;
                println!("[{:>4}s] {}", started.elapsed().as_secs(), metrics.line());
            }
        })
    };

    while clients.join_next().await.is_some() {}
    reporter.abort();

    println!("final: {}", metrics.line());

    let identified = metrics.latency_count.load(Ordering::Relaxed);
    if identified > 0 {
        println!(
            "mean time to identity: {}ms",
            metrics.latency_sum_ms.load(Ordering::Relaxed) / identified
        );
    }

    // Every move should reach every other client.
    let sent = metrics.moves_sent.load(Ordering::Relaxed);
    let moved = metrics.moved_received.load(Ordering::Relaxed);
    let expected = sent * u64::from(opts.clients.saturating_sub(1));
    if expected > 0 {
        println!(
            "fan-out delivery: {:.1}% ({}/{})",
            moved as f64 / expected as f64 * 100.0,
            moved,
            expected
        );
    }
}
