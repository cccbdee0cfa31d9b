//! Headless office participant: connects, wanders around, and logs what it
//! sees of everyone else.
//!
//! Usage: OFFICE_WS_URL=ws://host:3000/ws cargo run --bin office-bot

use std::time::{Duration, Instant};

use office_client::config::ClientConfig;
use office_client::connection::ServerConnection;
use office_client::presenter::LogPresenter;
use office_client::session::ClientSession;
use office_client::wanderer::Wanderer;
use office_shared::config::SpawnPoint;
use tracing_subscriber::EnvFilter;

const SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Joining office at {}", config.url);

    let connection = ServerConnection::connect(&config);
    let mut session = ClientSession::new(
        connection,
        LogPresenter,
        SpawnPoint::default(),
        config.publish,
    );

    let seed = std::process::id();
    let mut wanderer = Wanderer::new(seed);
    let tick = config.tick_interval();
    let mut last_tick = Instant::now();
    let mut last_summary = Instant::now();

    loop {
        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;

        session.pump();
        if session.local().is_bound() {
            wanderer.update(dt, &mut session.local_mut().state);
        }
        session.tick(now);

        if now.duration_since(last_summary) >= SUMMARY_INTERVAL {
            last_summary = now;
            let others: Vec<&str> = session
                .remotes()
                .iter()
                .map(|(_, remote)| remote.handle.0.as_str())
                .collect();
            tracing::info!(
                "{:?}: {} other(s) in the office {:?}",
                session.connection_state(),
                others.len(),
                others
            );
        }

        std::thread::sleep(tick.saturating_sub(now.elapsed()));
    }
}
