//! Datagram format for the UDP discovery beacon.
//!
//! A server periodically broadcasts one short ASCII payload so that
//! unconfigured clients on the same subnet can find it. The exchange is
//! strictly one-way; receivers must tolerate duplicates, reordering and
//! garbage.

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Token prefixing every beacon datagram.
pub const MARKER: &str = "RPS_SERVER";

/// UDP port beacons are broadcast to, distinct from the game TCP port.
pub const DISCOVERY_PORT: u16 = 5001;

/// Pause between consecutive beacon broadcasts.
pub const BEACON_INTERVAL: Duration = Duration::from_secs(3);

/// How long a client listens before presenting candidates.
pub const DISCOVERY_WINDOW: Duration = Duration::from_secs(5);

/// One discovery announcement: where the game server can be reached.
///
/// The embedded address is a hint only. Receivers should prefer the
/// datagram's observed source address, since a multi-homed host may
/// advertise an address that is not routable from the receiver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Display for Beacon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{MARKER}:{}:{}", self.addr, self.port)
    }
}

impl Beacon {
    /// Decode a received datagram. Truncated, malformed and foreign
    /// payloads all come back as `None`; listeners just skip them.
    pub fn parse(payload: &str) -> Option<Beacon> {
        let rest = payload.trim().strip_prefix(MARKER)?.strip_prefix(':')?;
        let (addr, port) = rest.split_once(':')?;
        Some(Beacon {
            addr: addr.parse().ok()?,
            port: port.parse().ok()?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format() {
        let beacon = Beacon {
            addr: Ipv4Addr::new(192, 168, 1, 5),
            port: 5000,
        };
        assert_eq!(beacon.to_string(), "RPS_SERVER:192.168.1.5:5000");
    }

    #[test]
    fn round_trip() {
        let beacon = Beacon {
            addr: Ipv4Addr::new(10, 0, 0, 7),
            port: 6001,
        };
        assert_eq!(Beacon::parse(&beacon.to_string()), Some(beacon));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Beacon::parse(""), None);
        assert_eq!(Beacon::parse("RPS_SERVER"), None);
        assert_eq!(Beacon::parse("RPS_SERVER:"), None);
        assert_eq!(Beacon::parse("RPS_SERVER:192.168.1.5"), None);
        assert_eq!(Beacon::parse("RPS_SERVER:not-an-ip:5000"), None);
        assert_eq!(Beacon::parse("RPS_SERVER:192.168.1.5:notaport"), None);
        assert_eq!(Beacon::parse("OTHER_GAME:192.168.1.5:5000"), None);
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(
            Beacon::parse("  RPS_SERVER:127.0.0.1:5000\n"),
            Some(Beacon {
                addr: Ipv4Addr::LOCALHOST,
                port: 5000,
            })
        );
    }
}
