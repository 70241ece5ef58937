use std::collections::HashMap;

use rps_lib::net::ServerMessage;
use tokio::sync::mpsc;

use crate::coordinator::RegisterError;

/// Outbound mailbox plus matchmaking flags for one connected player.
///
/// The registry owns presence; match state lives in the coordinator and
/// only ever refers to players by nickname.
#[derive(Debug)]
pub struct Player {
    outbound: mpsc::Sender<ServerMessage>,
    pub waiting_for_match: bool,
    pub coffee_bet: bool,
}

impl Player {
    fn new(outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            outbound,
            waiting_for_match: false,
            coffee_bet: false,
        }
    }

    /// Queue a message for delivery to this player's connection.
    ///
    /// Delivery is best-effort: a full or closed mailbox means the
    /// connection is on its way out and its worker will clean up shortly.
    pub fn send(&self, msg: ServerMessage) {
        if let Err(e) = self.outbound.try_send(msg) {
            tracing::debug!("Dropping message for disconnecting player: {e}");
        }
    }
}

/// The set of currently connected players, keyed by their unique nickname.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<String, Player>,
}

impl PlayerRegistry {
    /// Add a player. Nicknames are case-sensitive, immutable and unique;
    /// empty names are rejected outright.
    pub fn register(
        &mut self,
        nickname: &str,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Result<(), RegisterError> {
        if nickname.is_empty() {
            return Err(RegisterError::Invalid);
        }
        if self.players.contains_key(nickname) {
            return Err(RegisterError::Taken);
        }
        self.players.insert(nickname.to_owned(), Player::new(outbound));
        Ok(())
    }

    /// Drop a player's presence. Unknown nicknames are a no-op.
    pub fn remove(&mut self, nickname: &str) -> Option<Player> {
        self.players.remove(nickname)
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.players.contains_key(nickname)
    }

    pub fn get(&self, nickname: &str) -> Option<&Player> {
        self.players.get(nickname)
    }

    pub fn get_mut(&mut self, nickname: &str) -> Option<&mut Player> {
        self.players.get_mut(nickname)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Player)> {
        self.players.iter()
    }

    /// Sorted snapshot for the `players` command.
    pub fn nicknames(&self) -> Vec<String> {
        let mut names: Vec<_> = self.players.keys().cloned().collect();
        names.sort();
        names
    }
}
