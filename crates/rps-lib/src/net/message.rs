//! The line protocol spoken between client and server.
//!
//! Clients send short text commands; the server answers with notable
//! messages wrapped in a fixed `***` delimiter so adapters can tell them
//! apart from free text. Both directions go through the enums here rather
//! than ad hoc string matching: [`ClientCommand::parse`] is the only place
//! input lines are interpreted, and [`ServerMessage`]'s `Display` impl is
//! the only place outbound lines are produced.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::game::Move;

/// Delimiter wrapping every server message line.
pub const DELIMITER: &str = "***";

const CHOOSE_NICKNAME: &str = "Choose a nickname";
const NICKNAME_TAKEN: &str = "Nickname already taken. Choose another one";
const INVALID_NICKNAME: &str = "Nickname cannot be empty. Choose another one";
const WELCOME_PREFIX: &str = "Welcome ";
const WELCOME_SUFFIX: &str =
    "! Type 'play' to start a game, 'score' to see your score, or 'players' to list online players";
const MOVE_HELP: &str =
    "When in a game, use: R (Rock), P (Paper), or S (Scissors) to make your move";
const INVITE_HELP: &str = "You can also invite a specific player with 'play NICKNAME'";
const ALREADY_IN_GAME: &str = "You are already in a game";
const NOT_IN_GAME: &str = "You are not in a game";
const WAITING: &str = "Waiting for another player to join";
const WAITING_COFFEE: &str = "Waiting for another player to join with Coffee Bet Mode";
const COFFEE_ENABLED: &str = "Coffee Bet Mode enabled! Winner gets a coffee!";
const COFFEE_DISABLED: &str = "Coffee Bet Mode disabled";
const COFFEE_MATCH: &str = "Coffee Bet Mode enabled!";
const COFFEE_PROMPT: &str = "Do you accept the Coffee Bet challenge? (y/n)";
const MATCH_STARTED_PREFIX: &str = "You are now playing with ";
const MATCH_WON: &str = "Congratulations! You've won the match!";
const MATCH_LOST: &str = "You've lost the match. Better luck next time!";
const PLAY_AGAIN: &str = "Type 'play' to start a new game";
const OPPONENT_DISCONNECTED: &str = "Your opponent has disconnected";
const SCORE_PREFIX: &str = "Your score is ";
const OVERALL_SCORE_PREFIX: &str = "Your overall score is ";
const PLAYERS_PREFIX: &str = "Players online: ";
const INVALID_COMMAND: &str = "Invalid command. Available commands: play, play coffee, \
     play NICKNAME, y/n (for invitations), score, players, R, P, S";

/// One command line from a client, parsed case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Play,
    PlayCoffee,
    /// `play <nickname>` - a direct invitation.
    Invite(String),
    /// `y` / `yes`.
    Accept,
    /// `n` / `no`.
    Decline,
    Score,
    Players,
    Move(Move),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown command")]
pub struct UnknownCommand;

impl ClientCommand {
    pub fn parse(line: &str) -> Result<Self, UnknownCommand> {
        let line = line.trim();
        if line.eq_ignore_ascii_case("play") {
            return Ok(Self::Play);
        }
        // Checked before the invite form, so a player named "coffee"
        // cannot be invited.
        if line.eq_ignore_ascii_case("play coffee") {
            return Ok(Self::PlayCoffee);
        }
        if let (Some(prefix), Some(target)) = (line.get(..5), line.get(5..)) {
            if prefix.eq_ignore_ascii_case("play ") && !target.trim().is_empty() {
                return Ok(Self::Invite(target.trim().to_owned()));
            }
        }
        if line.eq_ignore_ascii_case("y") || line.eq_ignore_ascii_case("yes") {
            return Ok(Self::Accept);
        }
        if line.eq_ignore_ascii_case("n") || line.eq_ignore_ascii_case("no") {
            return Ok(Self::Decline);
        }
        if line.eq_ignore_ascii_case("score") {
            return Ok(Self::Score);
        }
        if line.eq_ignore_ascii_case("players") {
            return Ok(Self::Players);
        }
        if let Ok(mv) = line.parse::<Move>() {
            return Ok(Self::Move(mv));
        }
        Err(UnknownCommand)
    }
}

/// Everything the server can say to a client, one variant per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    // Handshake
    ChooseNickname,
    NicknameTaken,
    InvalidNickname,
    Welcome { nickname: String },
    MoveHelp,
    InviteHelp,

    // Matchmaking
    AlreadyInGame,
    Waiting,
    WaitingCoffee,

    // Coffee bet negotiation
    CoffeeModeEnabled,
    CoffeeModeDisabled,
    CoffeeBetMatch,
    CoffeeChallenge { from: String },
    CoffeeChallengePrompt,
    ChallengeAccepted { by: String },
    YouAcceptedChallenge,
    ChallengeDeclined { by: String },
    YouDeclinedChallenge,
    NoPendingChallenge,
    RequesterBusy,
    CoffeePeerBusy,

    // Invitations
    InvitationSent { to: String },
    InvitationReceived { from: String },
    InvitationQueued { to: String },
    QueuedInvitationReceived { from: String },
    QueuedInvitationActive { to: String },
    InvitationAccepted { by: String },
    InvitationDeclined { by: String },
    YouDeclinedInvitation,
    NoPendingInvitation,
    InviterBusy,
    InviteeBusy,
    PlayerNotFound { name: String },
    SelfInvite,

    // Rounds
    MatchStarted { opponent: String },
    WinTarget { rounds: u32 },
    MovePrompt,
    NextRoundPrompt,
    WaitingForOpponentMove,
    NotInGame,
    RoundReveal { own: Move, opponent: Move },
    RoundWon { wins: u32, needed: u32 },
    RoundLost { wins: u32, needed: u32 },
    RoundDraw,
    MatchWon,
    MatchLost,
    OverallScore { score: u32 },
    PlayAgain,
    OpponentDisconnected,

    // Queries and errors
    Score { score: u32 },
    Players { names: Vec<String> },
    InvalidCommand,
}

impl Display for ServerMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(DELIMITER)?;
        match self {
            Self::ChooseNickname => f.write_str(CHOOSE_NICKNAME)?,
            Self::NicknameTaken => f.write_str(NICKNAME_TAKEN)?,
            Self::InvalidNickname => f.write_str(INVALID_NICKNAME)?,
            Self::Welcome { nickname } => {
                write!(f, "{WELCOME_PREFIX}{nickname}{WELCOME_SUFFIX}")?
            }
            Self::MoveHelp => f.write_str(MOVE_HELP)?,
            Self::InviteHelp => f.write_str(INVITE_HELP)?,

            Self::AlreadyInGame => f.write_str(ALREADY_IN_GAME)?,
            Self::Waiting => f.write_str(WAITING)?,
            Self::WaitingCoffee => f.write_str(WAITING_COFFEE)?,

            Self::CoffeeModeEnabled => f.write_str(COFFEE_ENABLED)?,
            Self::CoffeeModeDisabled => f.write_str(COFFEE_DISABLED)?,
            Self::CoffeeBetMatch => f.write_str(COFFEE_MATCH)?,
            Self::CoffeeChallenge { from } => write!(
                f,
                "Player {from} wants to play a Coffee Bet game (loser buys coffee)"
            )?,
            Self::CoffeeChallengePrompt => f.write_str(COFFEE_PROMPT)?,
            Self::ChallengeAccepted { by } => {
                write!(f, "{by} accepted your coffee bet challenge!")?
            }
            Self::YouAcceptedChallenge => f.write_str("You accepted the coffee bet challenge!")?,
            Self::ChallengeDeclined { by } => {
                write!(f, "{by} declined your coffee bet challenge")?
            }
            Self::YouDeclinedChallenge => f.write_str("You declined the coffee bet challenge")?,
            Self::NoPendingChallenge => {
                f.write_str("You don't have any pending coffee bet challenges")?
            }
            Self::RequesterBusy => f.write_str("Requester is already in another game")?,
            Self::CoffeePeerBusy => f.write_str("Player is already in another game")?,

            Self::InvitationSent { to } => write!(f, "Invitation sent to {to}")?,
            Self::InvitationReceived { from } => {
                write!(f, "You have an invitation from {from}, play game? (y/n)")?
            }
            Self::InvitationQueued { to } => write!(
                f,
                "Player '{to}' is currently in a game. Your invitation will be queued."
            )?,
            Self::QueuedInvitationReceived { from } => {
                write!(f, "You have a queued invitation from {from}, play game? (y/n)")?
            }
            Self::QueuedInvitationActive { to } => {
                write!(f, "Your queued invitation to {to} is now active")?
            }
            Self::InvitationAccepted { by } => write!(f, "{by} accepted your invitation")?,
            Self::InvitationDeclined { by } => write!(f, "{by} declined your invitation")?,
            Self::YouDeclinedInvitation => f.write_str("You declined the invitation")?,
            Self::NoPendingInvitation => f.write_str("You don't have any pending invitations")?,
            Self::InviterBusy => f.write_str("Inviter is already in another game")?,
            Self::InviteeBusy => f.write_str("Invited player is already in another game")?,
            Self::PlayerNotFound { name } => write!(f, "Player '{name}' not found")?,
            Self::SelfInvite => f.write_str("You cannot invite yourself")?,

            Self::MatchStarted { opponent } => write!(f, "{MATCH_STARTED_PREFIX}{opponent}")?,
            Self::WinTarget { rounds } => {
                write!(f, "First to win {rounds} rounds wins the match!")?
            }
            Self::MovePrompt => {
                f.write_str("Choose your move: R (Rock), P (Paper), or S (Scissors)")?
            }
            Self::NextRoundPrompt => {
                f.write_str("Next round! Choose your move: R (Rock), P (Paper), or S (Scissors)")?
            }
            Self::WaitingForOpponentMove => f.write_str("Waiting for opponent's move")?,
            Self::NotInGame => f.write_str(NOT_IN_GAME)?,
            Self::RoundReveal { own, opponent } => {
                write!(f, "Your move: {own}, Opponent's move: {opponent}")?
            }
            Self::RoundWon { wins, needed } => {
                write!(f, "You won this round! (Round wins: {wins}/{needed})")?
            }
            Self::RoundLost { wins, needed } => {
                write!(f, "You lost this round! (Round wins: {wins}/{needed})")?
            }
            Self::RoundDraw => f.write_str("It's a draw for this round!")?,
            Self::MatchWon => f.write_str(MATCH_WON)?,
            Self::MatchLost => f.write_str(MATCH_LOST)?,
            Self::OverallScore { score } => write!(f, "{OVERALL_SCORE_PREFIX}{score}")?,
            Self::PlayAgain => f.write_str(PLAY_AGAIN)?,
            Self::OpponentDisconnected => f.write_str(OPPONENT_DISCONNECTED)?,

            Self::Score { score } => write!(f, "{SCORE_PREFIX}{score}")?,
            Self::Players { names } => write!(f, "{PLAYERS_PREFIX}{}", names.join(", "))?,
            Self::InvalidCommand => f.write_str(INVALID_COMMAND)?,
        }
        f.write_str(DELIMITER)
    }
}

impl ServerMessage {
    /// Decode a server line back into its variant.
    ///
    /// Only the messages a client adapter acts on are recognized here;
    /// everything else is informational free text and comes back as
    /// `None`, to be shown to the user verbatim.
    pub fn parse(line: &str) -> Option<ServerMessage> {
        let body = line
            .trim()
            .strip_prefix(DELIMITER)?
            .strip_suffix(DELIMITER)?;
        let msg = match body {
            CHOOSE_NICKNAME => Self::ChooseNickname,
            NICKNAME_TAKEN => Self::NicknameTaken,
            INVALID_NICKNAME => Self::InvalidNickname,
            WAITING => Self::Waiting,
            WAITING_COFFEE => Self::WaitingCoffee,
            MATCH_WON => Self::MatchWon,
            MATCH_LOST => Self::MatchLost,
            PLAY_AGAIN => Self::PlayAgain,
            OPPONENT_DISCONNECTED => Self::OpponentDisconnected,
            INVALID_COMMAND => Self::InvalidCommand,
            ALREADY_IN_GAME => Self::AlreadyInGame,
            NOT_IN_GAME => Self::NotInGame,
            _ => return Self::parse_fielded(body),
        };
        Some(msg)
    }

    fn parse_fielded(body: &str) -> Option<ServerMessage> {
        if let Some(rest) = body.strip_prefix(WELCOME_PREFIX) {
            let nickname = rest.strip_suffix(WELCOME_SUFFIX)?;
            return Some(Self::Welcome {
                nickname: nickname.to_owned(),
            });
        }
        if let Some(opponent) = body.strip_prefix(MATCH_STARTED_PREFIX) {
            return Some(Self::MatchStarted {
                opponent: opponent.to_owned(),
            });
        }
        if let Some(score) = body.strip_prefix(OVERALL_SCORE_PREFIX) {
            return Some(Self::OverallScore {
                score: score.parse().ok()?,
            });
        }
        if let Some(score) = body.strip_prefix(SCORE_PREFIX) {
            return Some(Self::Score {
                score: score.parse().ok()?,
            });
        }
        if let Some(names) = body.strip_prefix(PLAYERS_PREFIX) {
            let names = names
                .split(", ")
                .filter(|n| !n.is_empty())
                .map(str::to_owned)
                .collect();
            return Some(Self::Players { names });
        }
        None
    }
}
