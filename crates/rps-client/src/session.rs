use rps_lib::net::ServerMessage;

/// Where the session currently stands, as inferred from server messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// The server has asked for a nickname and not accepted one yet.
    #[default]
    ChoosingNickname,
    /// Registered and free to issue matchmaking commands.
    Idle,
    /// Queued for matchmaking.
    Waiting,
    /// In a live match.
    InMatch { opponent: String },
}

/// Minimal adapter mapping server messages onto session-state transitions.
///
/// It only tracks state; rendering stays a plain passthrough of the
/// server's text. Messages that carry no transition are ignored here.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    nickname: Option<String>,
}

impl Session {
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// True once the server has acknowledged a nickname, which it signals
    /// with the welcome line.
    pub fn is_ready(&self) -> bool {
        !matches!(self.state, SessionState::ChoosingNickname)
    }

    pub fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::ChooseNickname
            | ServerMessage::NicknameTaken
            | ServerMessage::InvalidNickname => {
                self.state = SessionState::ChoosingNickname;
                self.nickname = None;
            }
            ServerMessage::Welcome { nickname } => {
                self.nickname = Some(nickname.clone());
                self.state = SessionState::Idle;
            }
            ServerMessage::Waiting | ServerMessage::WaitingCoffee => {
                self.state = SessionState::Waiting;
            }
            ServerMessage::MatchStarted { opponent } => {
                self.state = SessionState::InMatch {
                    opponent: opponent.clone(),
                };
            }
            ServerMessage::MatchWon
            | ServerMessage::MatchLost
            | ServerMessage::OpponentDisconnected
            | ServerMessage::PlayAgain => {
                if matches!(self.state, SessionState::InMatch { .. }) {
                    self.state = SessionState::Idle;
                }
            }
            _ => {}
        }
    }
}
