use std::net::Ipv4Addr;
use std::time::Duration;

use rps_lib::discovery::{Beacon, BEACON_INTERVAL, DISCOVERY_PORT};
use tokio::net::UdpSocket;

/// Picks the address advertised in beacon datagrams.
///
/// Injected so tests can pin it; the heuristic is best-effort by nature
/// (multi-homed hosts, NAT) and receivers are told to trust the datagram
/// source address over it anyway.
type AddrResolver = fn() -> Ipv4Addr;

/// Periodic UDP broadcaster announcing where the game server listens.
///
/// Fully decoupled from the rest of the server: it shares nothing but the
/// TCP port number, never reads, and dies when its task is aborted.
pub struct DiscoveryBeacon {
    game_port: u16,
    interval: Duration,
    resolver: AddrResolver,
}

impl DiscoveryBeacon {
    pub fn new(game_port: u16) -> Self {
        Self {
            game_port,
            interval: BEACON_INTERVAL,
            resolver: local_ipv4,
        }
    }

    fn payload(&self) -> String {
        Beacon {
            addr: (self.resolver)(),
            port: self.game_port,
        }
        .to_string()
    }

    pub async fn run(self) {
        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!("Discovery beacon could not open a socket: {e}");
                return;
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            tracing::error!("Discovery beacon could not enable broadcast: {e}");
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let payload = self.payload();
            if let Err(e) = socket
                .send_to(payload.as_bytes(), (Ipv4Addr::BROADCAST, DISCOVERY_PORT))
                .await
            {
                // Not fatal; the next tick tries again.
                tracing::warn!("Failed to broadcast discovery beacon: {e}");
            } else {
                tracing::trace!("Broadcast {payload}");
            }
        }
    }
}

/// Best-effort local IPv4: ask the OS which source address it would route
/// a packet from, falling back to loopback when nothing better resolves.
///
/// Connecting a UDP socket sends nothing; it only fixes the route.
fn local_ipv4() -> Ipv4Addr {
    use std::net::{IpAddr, UdpSocket as StdUdpSocket};

    let probe = || -> std::io::Result<IpAddr> {
        let socket = StdUdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    };
    match probe() {
        Ok(IpAddr::V4(addr)) if !addr.is_loopback() => addr,
        _ => Ipv4Addr::LOCALHOST,
    }
}
