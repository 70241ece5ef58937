use thiserror::Error;
use tokio::sync::mpsc;

use crate::ledger::ScoreLedger;

use self::actor::Coordinator;
pub use self::handle::CoordinatorHandle;

mod actor;
mod handle;

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Nickname is already taken")]
    Taken,
    #[error("Nickname must not be empty")]
    Invalid,
    #[error("The coordinator is no longer running")]
    Shutdown,
}

/// Spawn the coordinator actor and hand back a handle for connection
/// workers. The actor owns every piece of shared game state; workers only
/// ever talk to it through the returned handle's command queue.
pub fn start(ledger: ScoreLedger, win_threshold: u32) -> CoordinatorHandle {
    let (sender, receiver) = mpsc::channel(256);
    let actor = Coordinator::new(receiver, ledger, win_threshold);
    tokio::spawn(actor.run());
    CoordinatorHandle { sender }
}
