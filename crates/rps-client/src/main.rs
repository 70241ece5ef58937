mod discovery;
mod session;

use anyhow::Result;
use rps_lib::net::connection::{self, ConnectionRx};
use rps_lib::net::ServerMessage;
use rps_lib::DEFAULT_GAME_PORT;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let target = resolve_target().await;
    println!("Connecting to {target}");
    let socket = TcpStream::connect(&target).await?;
    let (mut conn_tx, conn_rx) = connection::from_socket(socket);
    println!("Connected to server {target}");

    let recv_task = tokio::spawn(recv_task(conn_rx));

    // Forward stdin lines as commands; `exit` is handled locally.
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = stdin.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }
        if let Err(e) = conn_tx.write_line(line).await {
            tracing::error!("Error sending command, disconnecting: {e}");
            break;
        }
    }

    recv_task.abort();
    println!("Disconnected from server.");
    Ok(())
}

/// Explicit `host:port` argument first, discovered servers second,
/// loopback default last.
async fn resolve_target() -> String {
    if let Some(addr) = std::env::args().nth(1) {
        return addr;
    }

    let candidates = discovery::discover().await;
    match candidates.first() {
        Some(server) => {
            println!("Discovered {} server(s)", candidates.len());
            server.to_string()
        }
        None => {
            println!("No servers found. Trying {}", loopback());
            loopback()
        }
    }
}

fn loopback() -> String {
    format!("127.0.0.1:{DEFAULT_GAME_PORT}")
}

/// Print everything the server says and track the session state through
/// the shared message codec; unrecognized lines are plain information.
async fn recv_task(mut conn_rx: ConnectionRx) {
    let mut session = Session::default();
    loop {
        match conn_rx.read_line().await {
            Ok(Some(line)) => {
                println!("{line}");
                let Some(msg) = ServerMessage::parse(&line) else {
                    continue;
                };
                let was_ready = session.is_ready();
                session.apply(&msg);
                if session.is_ready() && !was_ready {
                    print_help();
                }
            }
            Ok(None) => {
                println!("Server closed the connection.");
                break;
            }
            Err(e) => {
                tracing::error!("Lost connection to server: {e}");
                break;
            }
        }
    }
}

fn print_help() {
    println!();
    println!("Available commands:");
    println!("- play: Find a match with another player");
    println!("- play coffee: Find a match with Coffee Bet Mode (loser buys coffee)");
    println!("- play NICKNAME: Invite a specific player");
    println!("- score: Show your current score");
    println!("- players: List all online players");
    println!("- R/P/S: Make a move (Rock, Paper, Scissors)");
    println!("- exit: Disconnect from the server");
    println!();
}
