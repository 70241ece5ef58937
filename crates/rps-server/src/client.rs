use rps_lib::net::connection::{self, ConnectionRx, ConnectionTx};
use rps_lib::net::{ClientCommand, FrameError, ServerMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::coordinator::{CoordinatorHandle, RegisterError};

/// Room for pushed messages while a connection is slow to drain.
const MAILBOX_DEPTH: usize = 64;

/// Take a socket for a newly connected client and begin serving it.
pub async fn handle_new_connection(coordinator: CoordinatorHandle, socket: TcpStream) {
    let (conn_tx, conn_rx) = connection::from_socket(socket);
    let client = ConnectingClient {
        coordinator,
        conn_tx,
        conn_rx,
    };
    if let Some(client) = client.handshake().await {
        client.run().await;
    }
}

/// A client that has connected but not yet claimed a nickname.
struct ConnectingClient {
    coordinator: CoordinatorHandle,
    conn_tx: ConnectionTx,
    conn_rx: ConnectionRx,
}

impl ConnectingClient {
    async fn handshake(mut self) -> Option<ConnectedClient> {
        let (outbound_tx, outbound_rx) = mpsc::channel(MAILBOX_DEPTH);
        match self.try_handshake(&outbound_tx).await {
            Ok(Some(nickname)) => {
                Some(ConnectedClient::new(self, nickname, outbound_tx, outbound_rx))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Connection lost during handshake: {e}");
                None
            }
        }
    }

    /// Prompt for nicknames until one registers. `Ok(None)` means the
    /// client went away (or the server is shutting down) before claiming
    /// one.
    async fn try_handshake(
        &mut self,
        outbound: &mpsc::Sender<ServerMessage>,
    ) -> Result<Option<String>, FrameError> {
        self.send(ServerMessage::ChooseNickname).await?;
        loop {
            let Some(line) = self.conn_rx.read_line().await? else {
                return Ok(None);
            };
            let candidate = line.trim().to_owned();
            match self.coordinator.register(&candidate, outbound.clone()).await {
                Ok(()) => return Ok(Some(candidate)),
                Err(RegisterError::Taken) => self.send(ServerMessage::NicknameTaken).await?,
                Err(RegisterError::Invalid) => self.send(ServerMessage::InvalidNickname).await?,
                Err(RegisterError::Shutdown) => return Ok(None),
            }
        }
    }

    async fn send(&mut self, msg: ServerMessage) -> Result<(), FrameError> {
        self.conn_tx.write_line(&msg.to_string()).await
    }
}

/// Pump mailbox messages out to the socket until either side goes away.
async fn send_task(mut conn_tx: ConnectionTx, mut outbound: mpsc::Receiver<ServerMessage>) {
    while let Some(msg) = outbound.recv().await {
        if conn_tx.write_line(&msg.to_string()).await.is_err() {
            return;
        }
    }
}

/// A registered player's connection worker.
struct ConnectedClient {
    coordinator: CoordinatorHandle,
    nickname: String,
    conn_rx: ConnectionRx,
    outbound: mpsc::Sender<ServerMessage>,
    send_task: JoinHandle<()>,
}

impl ConnectedClient {
    fn new(
        connecting: ConnectingClient,
        nickname: String,
        outbound: mpsc::Sender<ServerMessage>,
        outbound_rx: mpsc::Receiver<ServerMessage>,
    ) -> Self {
        let send_task = tokio::spawn(send_task(connecting.conn_tx, outbound_rx));
        Self {
            coordinator: connecting.coordinator,
            nickname,
            conn_rx: connecting.conn_rx,
            outbound,
            send_task,
        }
    }

    /// Serve the command loop until the client disconnects, then release
    /// every server-side record for this player.
    #[instrument(skip_all, fields(nickname = %self.nickname))]
    async fn run(mut self) {
        loop {
            let line = match self.conn_rx.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Error reading from client, closing connection: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            self.process(&line).await;
        }

        self.send_task.abort();
        self.coordinator.remove(&self.nickname).await;
        tracing::info!("Player disconnected");
    }

    async fn process(&mut self, line: &str) {
        let command = match ClientCommand::parse(line) {
            Ok(command) => command,
            Err(_) => {
                // Protocol-level user error: answered locally, the
                // connection stays up.
                let _ = self.outbound.try_send(ServerMessage::InvalidCommand);
                return;
            }
        };

        tracing::debug!("Received command: {command:?}");
        match command {
            ClientCommand::Play => self.coordinator.play(&self.nickname).await,
            ClientCommand::PlayCoffee => self.coordinator.play_coffee(&self.nickname).await,
            ClientCommand::Invite(target) => {
                self.coordinator.invite(&self.nickname, &target).await
            }
            ClientCommand::Accept => self.coordinator.respond(&self.nickname, true).await,
            ClientCommand::Decline => self.coordinator.respond(&self.nickname, false).await,
            ClientCommand::Score => self.coordinator.score(&self.nickname).await,
            ClientCommand::Players => self.coordinator.players(&self.nickname).await,
            ClientCommand::Move(mv) => self.coordinator.submit_move(&self.nickname, mv).await,
        }
    }
}
