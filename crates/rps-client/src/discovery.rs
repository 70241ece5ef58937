use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rps_lib::discovery::{Beacon, DISCOVERY_PORT, DISCOVERY_WINDOW};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

/// A server seen during the discovery window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    pub addr: IpAddr,
    pub port: u16,
}

impl Display for DiscoveredServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Turn one received datagram into a connection candidate.
///
/// The observed source address outranks the address embedded in the
/// payload, which may be stale or ambiguous on multi-homed hosts; only the
/// advertised TCP port is taken from the payload.
fn candidate_from(source: SocketAddr, payload: &str) -> Option<DiscoveredServer> {
    let beacon = Beacon::parse(payload)?;
    Some(DiscoveredServer {
        addr: source.ip(),
        port: beacon.port,
    })
}

/// Listen for beacons for the standard discovery window and return the
/// deduplicated candidates in first-seen order.
pub async fn discover() -> Vec<DiscoveredServer> {
    println!("Discovering servers...");
    match listen(DISCOVERY_WINDOW).await {
        Ok(servers) => servers,
        Err(e) => {
            tracing::warn!("Server discovery failed: {e}");
            Vec::new()
        }
    }
}

async fn listen(window: Duration) -> std::io::Result<Vec<DiscoveredServer>> {
    let socket = UdpSocket::bind(("0.0.0.0", DISCOVERY_PORT)).await?;
    socket.set_broadcast(true)?;

    let deadline = Instant::now() + window;
    let mut seen: Vec<DiscoveredServer> = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let Ok(received) = timeout_at(deadline, socket.recv_from(&mut buf)).await else {
            break; // window elapsed
        };
        let (len, source) = received?;
        let Ok(payload) = std::str::from_utf8(&buf[..len]) else {
            continue;
        };
        let Some(candidate) = candidate_from(source, payload) else {
            continue;
        };
        // Beacons repeat every few seconds; keep the first sighting only.
        if !seen.contains(&candidate) {
            println!("Discovered server: {candidate}");
            seen.push(candidate);
        }
    }
    Ok(seen)
}
