mod beacon;
mod client;
mod coordinator;
mod ledger;
mod registry;

use std::process::ExitCode;

use rps_lib::discovery::DISCOVERY_PORT;
use rps_lib::{DEFAULT_GAME_PORT, DEFAULT_WIN_THRESHOLD};
use tokio::net::TcpListener;

use beacon::DiscoveryBeacon;
use ledger::ScoreLedger;

const SCORES_FILE: &str = "player_scores.dat";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().init();

    let port = resolve_port();

    // A taken port is the one startup error worth dying for; everything
    // else degrades.
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Port {port} is already in use or cannot be bound: {e}");
            tracing::error!("Usage: rps-server [port]");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("RPS server started on port {port}");

    let mut ledger = ScoreLedger::new(SCORES_FILE);
    ledger.load();
    let coordinator = coordinator::start(ledger, DEFAULT_WIN_THRESHOLD);

    tokio::spawn(DiscoveryBeacon::new(port).run());
    tracing::info!("Server discovery beacon started on port {DISCOVERY_PORT}");

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Failed to accept a connection: {e}");
                continue;
            }
        };
        tracing::info!("New client connected: {addr}");

        tokio::spawn(client::handle_new_connection(coordinator.clone(), socket));
    }
}

/// First CLI argument wins; a malformed one warns and falls back. The
/// `PORT` environment variable is honored when no argument is given.
fn resolve_port() -> u16 {
    if let Some(arg) = std::env::args().nth(1) {
        return match arg.parse() {
            Ok(port) => port,
            Err(_) => {
                tracing::warn!(
                    "Invalid port number '{arg}'. Using default port {DEFAULT_GAME_PORT}"
                );
                DEFAULT_GAME_PORT
            }
        };
    }
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_GAME_PORT)
}
