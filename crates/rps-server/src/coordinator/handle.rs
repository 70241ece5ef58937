use rps_lib::game::Move;
use rps_lib::net::ServerMessage;
use tokio::sync::{mpsc, oneshot};

use super::actor::Action;
use super::RegisterError;

/// A connection worker's view of the coordinator.
///
/// Apart from registration, every call is fire-and-forget: the outcome is
/// pushed asynchronously through the affected players' mailboxes once the
/// actor has processed the command. This is what lets "wait for the
/// opponent" be a plain pending record instead of a blocked task.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    pub(super) sender: mpsc::Sender<Action>,
}

impl CoordinatorHandle {
    /// Claim a nickname, wiring up the player's outbound mailbox.
    pub async fn register(
        &self,
        nickname: &str,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Result<(), RegisterError> {
        let (tx, rx) = oneshot::channel();
        let msg = Action::Register {
            nickname: nickname.to_owned(),
            outbound,
            respond_to: tx,
        };
        // A send error means the actor is gone, in which case rx fails too.
        let _ = self.sender.send(msg).await;
        rx.await.unwrap_or(Err(RegisterError::Shutdown))
    }

    /// Release every record for a player. Safe to call for nicknames that
    /// were never registered.
    pub async fn remove(&self, nickname: &str) {
        self.send(Action::Remove {
            nickname: nickname.to_owned(),
        })
        .await;
    }

    pub async fn play(&self, nickname: &str) {
        self.send(Action::Play {
            nickname: nickname.to_owned(),
        })
        .await;
    }

    pub async fn play_coffee(&self, nickname: &str) {
        self.send(Action::PlayCoffee {
            nickname: nickname.to_owned(),
        })
        .await;
    }

    pub async fn invite(&self, nickname: &str, target: &str) {
        self.send(Action::Invite {
            nickname: nickname.to_owned(),
            target: target.to_owned(),
        })
        .await;
    }

    /// A `y`/`n` answer; the actor works out whether it resolves a coffee
    /// bet challenge or a plain invitation.
    pub async fn respond(&self, nickname: &str, accepted: bool) {
        self.send(Action::Respond {
            nickname: nickname.to_owned(),
            accepted,
        })
        .await;
    }

    pub async fn submit_move(&self, nickname: &str, mv: Move) {
        self.send(Action::SubmitMove {
            nickname: nickname.to_owned(),
            mv,
        })
        .await;
    }

    pub async fn score(&self, nickname: &str) {
        self.send(Action::Score {
            nickname: nickname.to_owned(),
        })
        .await;
    }

    pub async fn players(&self, nickname: &str) {
        self.send(Action::Players {
            nickname: nickname.to_owned(),
        })
        .await;
    }

    async fn send(&self, action: Action) {
        if self.sender.send(action).await.is_err() {
            tracing::warn!("Coordinator is gone; dropping action");
        }
    }
}
