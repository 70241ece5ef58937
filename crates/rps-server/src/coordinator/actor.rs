use std::collections::{HashMap, VecDeque};

use rps_lib::game::{Move, Outcome};
use rps_lib::net::ServerMessage;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::ledger::ScoreLedger;
use crate::registry::PlayerRegistry;

use super::RegisterError;

/// The single owner of all shared game state.
///
/// Every mutating operation on the registry, the match table, the pending
/// maps and the ledger goes through this actor's command queue, so compound
/// read-modify-write sequences ("find a waiting candidate and mark both
/// matched") are serialized against each other by construction.
pub struct Coordinator {
    receiver: mpsc::Receiver<Action>,
    registry: PlayerRegistry,
    ledger: ScoreLedger,
    win_threshold: u32,
    /// Symmetric pairing: both directions are present while a match lives.
    matches: HashMap<String, String>,
    /// Pending move per player, cleared every round.
    moves: HashMap<String, Move>,
    round_wins: HashMap<String, u32>,
    /// Inviter -> target. One per inviter; a newer invite replaces it.
    pending_invitations: HashMap<String, String>,
    /// Busy target -> inviters, oldest first.
    queued_invitations: HashMap<String, VecDeque<String>>,
    /// Player being asked -> requester whose coffee bet it is.
    pending_coffee: HashMap<String, String>,
}

#[derive(Debug)]
pub enum Action {
    Register {
        nickname: String,
        outbound: mpsc::Sender<ServerMessage>,
        respond_to: oneshot::Sender<Result<(), RegisterError>>,
    },
    Remove {
        nickname: String,
    },
    Play {
        nickname: String,
    },
    PlayCoffee {
        nickname: String,
    },
    Invite {
        nickname: String,
        target: String,
    },
    Respond {
        nickname: String,
        accepted: bool,
    },
    SubmitMove {
        nickname: String,
        mv: Move,
    },
    Score {
        nickname: String,
    },
    Players {
        nickname: String,
    },
}

impl Coordinator {
    pub fn new(receiver: mpsc::Receiver<Action>, ledger: ScoreLedger, win_threshold: u32) -> Self {
        Self {
            receiver,
            registry: PlayerRegistry::default(),
            ledger,
            win_threshold,
            matches: HashMap::new(),
            moves: HashMap::new(),
            round_wins: HashMap::new(),
            pending_invitations: HashMap::new(),
            queued_invitations: HashMap::new(),
            pending_coffee: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        while let Some(action) = self.receiver.recv().await {
            match action {
                Action::Register {
                    nickname,
                    outbound,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.register(&nickname, outbound));
                }
                Action::Remove { nickname } => self.remove(&nickname),
                Action::Play { nickname } => self.play(&nickname),
                Action::PlayCoffee { nickname } => self.play_coffee(&nickname),
                Action::Invite { nickname, target } => self.invite(&nickname, &target),
                Action::Respond { nickname, accepted } => self.respond(&nickname, accepted),
                Action::SubmitMove { nickname, mv } => self.submit_move(&nickname, mv),
                Action::Score { nickname } => self.score(&nickname),
                Action::Players { nickname } => self.players(&nickname),
            }
        }
        tracing::info!("Coordinator stopped");
    }

    fn send(&self, nickname: &str, msg: ServerMessage) {
        if let Some(player) = self.registry.get(nickname) {
            player.send(msg);
        }
    }

    fn in_match(&self, nickname: &str) -> bool {
        self.matches.contains_key(nickname)
    }
}

// ----------------------------------------------------------------------------
// Action handlers
// ----------------------------------------------------------------------------
impl Coordinator {
    #[instrument(skip(self, outbound))]
    fn register(
        &mut self,
        nickname: &str,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Result<(), RegisterError> {
        self.registry.register(nickname, outbound)?;
        self.ledger.ensure(nickname);
        // The greeting goes through the mailbox so nothing can interleave
        // between registration and it, not even an instant invitation.
        self.send(
            nickname,
            ServerMessage::Welcome {
                nickname: nickname.to_owned(),
            },
        );
        self.send(nickname, ServerMessage::MoveHelp);
        self.send(nickname, ServerMessage::InviteHelp);
        tracing::info!("Player registered");
        Ok(())
    }

    /// Release every record that refers to a player, notifying an abandoned
    /// opponent along the way. Idempotent for unknown nicknames.
    #[instrument(skip(self))]
    fn remove(&mut self, nickname: &str) {
        if self.registry.remove(nickname).is_none() {
            return;
        }

        // Purge pending state in both roles first, so nothing dangles and
        // no invitation from the departing player can resurface below.
        self.pending_invitations.remove(nickname);
        self.pending_invitations.retain(|_, target| target != nickname);
        self.pending_coffee.remove(nickname);
        self.pending_coffee.retain(|_, requester| requester != nickname);
        self.queued_invitations.remove(nickname);
        for queue in self.queued_invitations.values_mut() {
            queue.retain(|inviter| inviter != nickname);
        }
        self.queued_invitations.retain(|_, queue| !queue.is_empty());

        // Tear down a live match; the survivor goes back to idle and gets
        // its invitation backlog serviced, same as after a finished match.
        if let Some(opponent) = self.matches.remove(nickname) {
            self.matches.remove(&opponent);
            self.round_wins.remove(&opponent);
            self.moves.remove(&opponent);
            if let Some(player) = self.registry.get_mut(&opponent) {
                player.coffee_bet = false;
            }
            self.send(&opponent, ServerMessage::OpponentDisconnected);
            self.check_queued_invitations(&opponent);
        }
        self.round_wins.remove(nickname);
        self.moves.remove(nickname);

        self.ledger.save();
        tracing::info!("Player removed");
    }

    #[instrument(skip(self))]
    fn play(&mut self, nickname: &str) {
        if self.in_match(nickname) {
            self.send(nickname, ServerMessage::AlreadyInGame);
            return;
        }

        if let Some(candidate) = self.find_waiting_opponent(nickname) {
            let candidate_coffee = self
                .registry
                .get(&candidate)
                .is_some_and(|p| p.coffee_bet);
            let own_coffee = self.registry.get(nickname).is_some_and(|p| p.coffee_bet);
            if candidate_coffee && !own_coffee {
                // The waiting player wants a stake; don't pair until the
                // caller opts in too.
                self.send(
                    nickname,
                    ServerMessage::CoffeeChallenge {
                        from: candidate.clone(),
                    },
                );
                self.send(nickname, ServerMessage::CoffeeChallengePrompt);
                self.pending_coffee.insert(nickname.to_owned(), candidate);
                return;
            }
            self.start_match(nickname, &candidate);
            return;
        }

        if let Some(player) = self.registry.get_mut(nickname) {
            player.waiting_for_match = true;
            player.send(ServerMessage::Waiting);
        }
    }

    #[instrument(skip(self))]
    fn play_coffee(&mut self, nickname: &str) {
        if self.in_match(nickname) {
            self.send(nickname, ServerMessage::AlreadyInGame);
            return;
        }

        match self.registry.get_mut(nickname) {
            Some(player) => {
                player.coffee_bet = true;
                player.send(ServerMessage::CoffeeModeEnabled);
            }
            None => return,
        }

        if let Some(candidate) = self.find_waiting_opponent(nickname) {
            let candidate_coffee = self
                .registry
                .get(&candidate)
                .is_some_and(|p| p.coffee_bet);
            if !candidate_coffee {
                // Ask the waiting player to opt in instead.
                self.send(
                    &candidate,
                    ServerMessage::CoffeeChallenge {
                        from: nickname.to_owned(),
                    },
                );
                self.send(&candidate, ServerMessage::CoffeeChallengePrompt);
                self.pending_coffee.insert(candidate, nickname.to_owned());
                return;
            }
            self.start_match(nickname, &candidate);
            return;
        }

        if let Some(player) = self.registry.get_mut(nickname) {
            player.waiting_for_match = true;
            player.send(ServerMessage::WaitingCoffee);
        }
    }

    /// First-fit scan in registry iteration order. There is deliberately no
    /// oldest-waiting-first fairness; waiting time plays no part.
    fn find_waiting_opponent(&self, nickname: &str) -> Option<String> {
        self.registry
            .iter()
            .find(|(name, player)| {
                name.as_str() != nickname
                    && !self.matches.contains_key(name.as_str())
                    && player.waiting_for_match
            })
            .map(|(name, _)| name.clone())
    }

    #[instrument(skip(self))]
    fn invite(&mut self, inviter: &str, target: &str) {
        if self.in_match(inviter) {
            self.send(inviter, ServerMessage::AlreadyInGame);
            return;
        }
        if !self.registry.contains(target) {
            self.send(
                inviter,
                ServerMessage::PlayerNotFound {
                    name: target.to_owned(),
                },
            );
            return;
        }
        if inviter == target {
            self.send(inviter, ServerMessage::SelfInvite);
            return;
        }

        if self.in_match(target) {
            self.send(
                inviter,
                ServerMessage::InvitationQueued {
                    to: target.to_owned(),
                },
            );
            self.queued_invitations
                .entry(target.to_owned())
                .or_default()
                .push_back(inviter.to_owned());
            return;
        }

        self.send(
            inviter,
            ServerMessage::InvitationSent {
                to: target.to_owned(),
            },
        );
        self.send(
            target,
            ServerMessage::InvitationReceived {
                from: inviter.to_owned(),
            },
        );
        // A newer invitation from the same inviter replaces the older one;
        // the replaced invite is simply lost.
        self.pending_invitations
            .insert(inviter.to_owned(), target.to_owned());
    }

    fn respond(&mut self, responder: &str, accepted: bool) {
        // A pending coffee bet challenge outranks a pending invitation.
        if self.pending_coffee.contains_key(responder) {
            self.respond_coffee(responder, accepted);
        } else {
            self.respond_invitation(responder, accepted);
        }
    }

    #[instrument(skip(self))]
    fn respond_invitation(&mut self, responder: &str, accepted: bool) {
        let Some(inviter) = self
            .pending_invitations
            .iter()
            .find(|(_, target)| target.as_str() == responder)
            .map(|(inviter, _)| inviter.clone())
        else {
            self.send(responder, ServerMessage::NoPendingInvitation);
            return;
        };
        self.pending_invitations.remove(&inviter);

        // Either side may have been paired through matchmaking since the
        // invitation went out; if so the invitation is void.
        if self.in_match(&inviter) || self.in_match(responder) {
            if !self.in_match(responder) {
                self.send(responder, ServerMessage::InviterBusy);
            }
            if !self.in_match(&inviter) {
                self.send(&inviter, ServerMessage::InviteeBusy);
            }
            return;
        }

        if accepted {
            self.send(
                &inviter,
                ServerMessage::InvitationAccepted {
                    by: responder.to_owned(),
                },
            );
            self.start_match(&inviter, responder);
        } else {
            self.send(
                &inviter,
                ServerMessage::InvitationDeclined {
                    by: responder.to_owned(),
                },
            );
            self.send(responder, ServerMessage::YouDeclinedInvitation);
        }
    }

    #[instrument(skip(self))]
    fn respond_coffee(&mut self, responder: &str, accepted: bool) {
        let Some(requester) = self.pending_coffee.remove(responder) else {
            self.send(responder, ServerMessage::NoPendingChallenge);
            return;
        };

        if self.in_match(&requester) || self.in_match(responder) {
            if !self.in_match(responder) {
                self.send(responder, ServerMessage::RequesterBusy);
            }
            if !self.in_match(&requester) {
                self.send(&requester, ServerMessage::CoffeePeerBusy);
            }
            return;
        }

        if accepted {
            if let Some(player) = self.registry.get_mut(responder) {
                player.coffee_bet = true;
            }
            self.send(
                &requester,
                ServerMessage::ChallengeAccepted {
                    by: responder.to_owned(),
                },
            );
            self.send(responder, ServerMessage::YouAcceptedChallenge);
            self.start_match(&requester, responder);
        } else {
            self.send(
                &requester,
                ServerMessage::ChallengeDeclined {
                    by: responder.to_owned(),
                },
            );
            self.send(responder, ServerMessage::YouDeclinedChallenge);

            // If the requester enabled the stake just to seek this match
            // and is still waiting, roll both back.
            let still_waiting = self
                .registry
                .get(&requester)
                .is_some_and(|p| p.waiting_for_match);
            if still_waiting {
                if let Some(player) = self.registry.get_mut(&requester) {
                    player.coffee_bet = false;
                    player.waiting_for_match = false;
                    player.send(ServerMessage::CoffeeModeDisabled);
                }
            }
        }
    }

    /// The sole entry point that creates a match. Callers pre-check, but a
    /// player already in a match must never be paired again, so the check
    /// is repeated here.
    fn start_match(&mut self, p1: &str, p2: &str) {
        if self.in_match(p1) || self.in_match(p2) {
            tracing::warn!("Refusing to pair an already-matched player ({p1} / {p2})");
            return;
        }

        self.matches.insert(p1.to_owned(), p2.to_owned());
        self.matches.insert(p2.to_owned(), p1.to_owned());
        self.moves.remove(p1);
        self.moves.remove(p2);
        self.round_wins.insert(p1.to_owned(), 0);
        self.round_wins.insert(p2.to_owned(), 0);

        let is_coffee = self.registry.get(p1).is_some_and(|p| p.coffee_bet)
            && self.registry.get(p2).is_some_and(|p| p.coffee_bet);

        for (me, opponent) in [(p1, p2), (p2, p1)] {
            if is_coffee {
                self.send(me, ServerMessage::CoffeeBetMatch);
            }
            self.send(
                me,
                ServerMessage::MatchStarted {
                    opponent: opponent.to_owned(),
                },
            );
            self.send(
                me,
                ServerMessage::WinTarget {
                    rounds: self.win_threshold,
                },
            );
            self.send(me, ServerMessage::MovePrompt);
            if let Some(player) = self.registry.get_mut(me) {
                player.waiting_for_match = false;
            }
        }
        tracing::info!("Match started: {p1} vs {p2}");
    }

    #[instrument(skip(self))]
    fn submit_move(&mut self, nickname: &str, mv: Move) {
        let Some(opponent) = self.matches.get(nickname).cloned() else {
            self.send(nickname, ServerMessage::NotInGame);
            return;
        };

        // A repeated move before the opponent answers overwrites the
        // earlier one.
        self.moves.insert(nickname.to_owned(), mv);

        let Some(opponent_move) = self.moves.get(&opponent).copied() else {
            self.send(nickname, ServerMessage::WaitingForOpponentMove);
            return;
        };

        self.send(
            nickname,
            ServerMessage::RoundReveal {
                own: mv,
                opponent: opponent_move,
            },
        );
        self.send(
            &opponent,
            ServerMessage::RoundReveal {
                own: opponent_move,
                opponent: mv,
            },
        );

        match mv.beats(opponent_move) {
            Outcome::Win => self.finish_round(nickname, &opponent),
            Outcome::Loss => self.finish_round(&opponent, nickname),
            Outcome::Draw => {
                self.send(nickname, ServerMessage::RoundDraw);
                self.send(&opponent, ServerMessage::RoundDraw);
                self.prompt_next_round(nickname, &opponent);
            }
        }

        self.moves.remove(nickname);
        self.moves.remove(&opponent);
    }

    /// A decided round: count it, credit the ledger, and either play on or
    /// close out the match.
    fn finish_round(&mut self, winner: &str, loser: &str) {
        let wins = self.round_wins.get(winner).copied().unwrap_or(0) + 1;
        self.round_wins.insert(winner.to_owned(), wins);
        self.ledger.increment(winner);

        let loser_wins = self.round_wins.get(loser).copied().unwrap_or(0);
        self.send(
            winner,
            ServerMessage::RoundWon {
                wins,
                needed: self.win_threshold,
            },
        );
        self.send(
            loser,
            ServerMessage::RoundLost {
                wins: loser_wins,
                needed: self.win_threshold,
            },
        );

        if wins >= self.win_threshold {
            self.send(winner, ServerMessage::MatchWon);
            self.send(loser, ServerMessage::MatchLost);
            self.ledger.save();
            self.end_match(winner, loser);
        } else {
            self.prompt_next_round(winner, loser);
        }
    }

    fn prompt_next_round(&self, p1: &str, p2: &str) {
        self.send(p1, ServerMessage::NextRoundPrompt);
        self.send(p2, ServerMessage::NextRoundPrompt);
    }

    /// Drop the match and all per-match transient state, tell both players
    /// where they stand, then service any invitations that queued up while
    /// they were busy.
    fn end_match(&mut self, p1: &str, p2: &str) {
        self.matches.remove(p1);
        self.matches.remove(p2);
        self.round_wins.remove(p1);
        self.round_wins.remove(p2);
        self.moves.remove(p1);
        self.moves.remove(p2);

        for nickname in [p1, p2] {
            if let Some(player) = self.registry.get_mut(nickname) {
                player.coffee_bet = false;
            }
            let score = self.ledger.get(nickname);
            self.send(nickname, ServerMessage::OverallScore { score });
            self.send(nickname, ServerMessage::PlayAgain);
        }

        self.check_queued_invitations(p1);
        self.check_queued_invitations(p2);
    }

    /// Deliver the oldest queued invitation whose inviter is still free as
    /// a fresh pending invitation. Invitations whose inviter found another
    /// match in the meantime lapse silently.
    fn check_queued_invitations(&mut self, nickname: &str) {
        while let Some(queue) = self.queued_invitations.get_mut(nickname) {
            let Some(inviter) = queue.pop_front() else {
                self.queued_invitations.remove(nickname);
                return;
            };
            if queue.is_empty() {
                self.queued_invitations.remove(nickname);
            }
            if self.in_match(&inviter) {
                continue;
            }
            self.send(
                nickname,
                ServerMessage::QueuedInvitationReceived {
                    from: inviter.clone(),
                },
            );
            self.send(
                &inviter,
                ServerMessage::QueuedInvitationActive {
                    to: nickname.to_owned(),
                },
            );
            self.pending_invitations
                .insert(inviter, nickname.to_owned());
            return;
        }
    }

    fn score(&self, nickname: &str) {
        self.send(
            nickname,
            ServerMessage::Score {
                score: self.ledger.get(nickname),
            },
        );
    }

    fn players(&self, nickname: &str) {
        self.send(
            nickname,
            ServerMessage::Players {
                names: self.registry.nicknames(),
            },
        );
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use rps_lib::game::Move;
    use rps_lib::net::ServerMessage;
    use tokio::sync::mpsc;

    use super::*;

    struct TestRig {
        coordinator: Coordinator,
        mailboxes: HashMap<String, mpsc::Receiver<ServerMessage>>,
        ledger_path: PathBuf,
    }

    impl TestRig {
        fn new(name: &str) -> Self {
            let ledger_path = std::env::temp_dir()
                .join(format!("rps-actor-{}-{name}.dat", std::process::id()));
            let _ = std::fs::remove_file(&ledger_path);
            let (_tx, rx) = mpsc::channel(1);
            Self {
                coordinator: Coordinator::new(rx, ScoreLedger::new(&ledger_path), 3),
                mailboxes: HashMap::new(),
                ledger_path,
            }
        }

        fn join(&mut self, nickname: &str) {
            let (tx, rx) = mpsc::channel(64);
            self.coordinator.register(nickname, tx).unwrap();
            self.mailboxes.insert(nickname.to_owned(), rx);
            // The greeting is not interesting to most tests.
            self.drain(nickname);
        }

        /// Everything queued for a player since the last drain.
        fn drain(&mut self, nickname: &str) -> Vec<ServerMessage> {
            let rx = self.mailboxes.get_mut(nickname).expect("unknown player");
            let mut out = Vec::new();
            while let Ok(msg) = rx.try_recv() {
                out.push(msg);
            }
            out
        }

        /// Pair two players through plain matchmaking, discarding the
        /// pairing chatter.
        fn pair(&mut self, a: &str, b: &str) {
            self.coordinator.play(a);
            self.coordinator.play(b);
            self.drain(a);
            self.drain(b);
        }
    }

    impl Drop for TestRig {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.ledger_path);
        }
    }

    #[test]
    fn registration_is_unique_and_greets() {
        let mut rig = TestRig::new("register");
        let (tx, mut rx) = mpsc::channel(64);
        rig.coordinator.register("alice", tx).unwrap();
        let greeting: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            greeting[0],
            ServerMessage::Welcome {
                nickname: "alice".to_owned()
            }
        );

        let (tx, _rx) = mpsc::channel(64);
        assert_eq!(
            rig.coordinator.register("alice", tx),
            Err(RegisterError::Taken)
        );
    }

    #[test]
    fn play_waits_until_a_second_player_arrives() {
        let mut rig = TestRig::new("pairing");
        rig.join("alice");
        rig.join("bob");

        rig.coordinator.play("alice");
        assert_eq!(rig.drain("alice"), [ServerMessage::Waiting]);

        rig.coordinator.play("bob");
        let bob = rig.drain("bob");
        assert!(bob.contains(&ServerMessage::MatchStarted {
            opponent: "alice".to_owned()
        }));
        assert!(bob.contains(&ServerMessage::WinTarget { rounds: 3 }));
        assert!(bob.contains(&ServerMessage::MovePrompt));
        assert!(rig.drain("alice").contains(&ServerMessage::MatchStarted {
            opponent: "bob".to_owned()
        }));
    }

    #[test]
    fn playing_twice_is_rejected() {
        let mut rig = TestRig::new("replay");
        rig.join("alice");
        rig.join("bob");
        rig.pair("alice", "bob");

        rig.coordinator.play("alice");
        assert_eq!(rig.drain("alice"), [ServerMessage::AlreadyInGame]);
    }

    #[test]
    fn first_move_is_acknowledged_and_held() {
        let mut rig = TestRig::new("held-move");
        rig.join("alice");
        rig.join("bob");
        rig.pair("alice", "bob");

        rig.coordinator.submit_move("alice", Move::Rock);
        assert_eq!(rig.drain("alice"), [ServerMessage::WaitingForOpponentMove]);
        assert!(rig.drain("bob").is_empty());
    }

    #[test]
    fn move_without_a_match_is_an_error() {
        let mut rig = TestRig::new("no-match-move");
        rig.join("alice");
        rig.coordinator.submit_move("alice", Move::Rock);
        assert_eq!(rig.drain("alice"), [ServerMessage::NotInGame]);
    }

    #[test]
    fn round_reveals_and_scores_the_winner() {
        let mut rig = TestRig::new("round");
        rig.join("alice");
        rig.join("bob");
        rig.pair("alice", "bob");

        rig.coordinator.submit_move("alice", Move::Rock);
        rig.drain("alice");
        rig.coordinator.submit_move("bob", Move::Paper);

        let alice = rig.drain("alice");
        assert_eq!(
            alice,
            [
                ServerMessage::RoundReveal {
                    own: Move::Rock,
                    opponent: Move::Paper
                },
                ServerMessage::RoundLost { wins: 0, needed: 3 },
                ServerMessage::NextRoundPrompt,
            ]
        );
        let bob = rig.drain("bob");
        assert_eq!(
            bob,
            [
                ServerMessage::RoundReveal {
                    own: Move::Paper,
                    opponent: Move::Rock
                },
                ServerMessage::RoundWon { wins: 1, needed: 3 },
                ServerMessage::NextRoundPrompt,
            ]
        );

        // Round win credited to the ledger immediately; the loser's score
        // is untouched.
        assert_eq!(rig.coordinator.ledger.get("bob"), 1);
        assert_eq!(rig.coordinator.ledger.get("alice"), 0);
        assert_eq!(rig.coordinator.round_wins.get("bob"), Some(&1));
        // Moves are cleared for the next round.
        assert!(rig.coordinator.moves.is_empty());
    }

    #[test]
    fn draws_count_for_nobody() {
        let mut rig = TestRig::new("draw");
        rig.join("alice");
        rig.join("bob");
        rig.pair("alice", "bob");

        rig.coordinator.submit_move("alice", Move::Scissors);
        rig.drain("alice");
        rig.coordinator.submit_move("bob", Move::Scissors);

        assert!(rig.drain("alice").contains(&ServerMessage::RoundDraw));
        assert!(rig.drain("bob").contains(&ServerMessage::RoundDraw));
        assert_eq!(rig.coordinator.ledger.get("alice"), 0);
        assert_eq!(rig.coordinator.ledger.get("bob"), 0);
        assert_eq!(rig.coordinator.round_wins.get("alice"), Some(&0));
    }

    #[test]
    fn three_round_wins_take_the_match() {
        let mut rig = TestRig::new("threshold");
        rig.join("alice");
        rig.join("bob");
        rig.pair("alice", "bob");

        for _ in 0..2 {
            rig.coordinator.submit_move("alice", Move::Rock);
            rig.coordinator.submit_move("bob", Move::Paper);
            rig.drain("alice");
            rig.drain("bob");
        }
        // Counters stay below the threshold until the deciding round.
        assert_eq!(rig.coordinator.round_wins.get("bob"), Some(&2));

        rig.coordinator.submit_move("alice", Move::Rock);
        rig.coordinator.submit_move("bob", Move::Paper);

        let bob = rig.drain("bob");
        assert!(bob.contains(&ServerMessage::MatchWon));
        assert!(bob.contains(&ServerMessage::OverallScore { score: 3 }));
        assert!(bob.contains(&ServerMessage::PlayAgain));
        let alice = rig.drain("alice");
        assert!(alice.contains(&ServerMessage::MatchLost));
        assert!(alice.contains(&ServerMessage::OverallScore { score: 0 }));

        // All per-match state is gone and both are immediately playable.
        assert!(rig.coordinator.matches.is_empty());
        assert!(rig.coordinator.round_wins.is_empty());
        assert!(rig.coordinator.moves.is_empty());
        rig.coordinator.play("alice");
        assert_eq!(rig.drain("alice"), [ServerMessage::Waiting]);
    }

    #[test]
    fn self_invite_is_rejected_without_a_record() {
        let mut rig = TestRig::new("self-invite");
        rig.join("carol");
        rig.coordinator.invite("carol", "carol");
        assert_eq!(rig.drain("carol"), [ServerMessage::SelfInvite]);
        assert!(rig.coordinator.pending_invitations.is_empty());
    }

    #[test]
    fn inviting_an_unknown_player_fails() {
        let mut rig = TestRig::new("unknown-invite");
        rig.join("carol");
        rig.coordinator.invite("carol", "mallory");
        assert_eq!(
            rig.drain("carol"),
            [ServerMessage::PlayerNotFound {
                name: "mallory".to_owned()
            }]
        );
    }

    #[test]
    fn invitation_accept_starts_the_match() {
        let mut rig = TestRig::new("invite-accept");
        rig.join("dan");
        rig.join("eve");

        rig.coordinator.invite("dan", "eve");
        assert_eq!(
            rig.drain("dan"),
            [ServerMessage::InvitationSent {
                to: "eve".to_owned()
            }]
        );
        assert_eq!(
            rig.drain("eve"),
            [ServerMessage::InvitationReceived {
                from: "dan".to_owned()
            }]
        );

        rig.coordinator.respond("eve", true);
        let dan = rig.drain("dan");
        assert!(dan.contains(&ServerMessage::InvitationAccepted {
            by: "eve".to_owned()
        }));
        assert!(dan.contains(&ServerMessage::MatchStarted {
            opponent: "eve".to_owned()
        }));
        assert!(rig.coordinator.in_match("dan"));
        assert!(rig.coordinator.in_match("eve"));
    }

    #[test]
    fn invitation_decline_leaves_both_idle() {
        let mut rig = TestRig::new("invite-decline");
        rig.join("dan");
        rig.join("eve");
        rig.coordinator.invite("dan", "eve");
        rig.drain("dan");
        rig.drain("eve");

        rig.coordinator.respond("eve", false);
        assert_eq!(
            rig.drain("dan"),
            [ServerMessage::InvitationDeclined {
                by: "eve".to_owned()
            }]
        );
        assert_eq!(rig.drain("eve"), [ServerMessage::YouDeclinedInvitation]);
        assert!(!rig.coordinator.in_match("dan"));
        assert!(!rig.coordinator.in_match("eve"));
    }

    #[test]
    fn response_without_invitation_is_an_error() {
        let mut rig = TestRig::new("no-invite");
        rig.join("eve");
        rig.coordinator.respond("eve", true);
        assert_eq!(rig.drain("eve"), [ServerMessage::NoPendingInvitation]);
    }

    #[test]
    fn invitation_lost_to_a_matchmaking_race_informs_both() {
        let mut rig = TestRig::new("invite-race");
        rig.join("dan");
        rig.join("eve");
        rig.join("frank");

        rig.coordinator.invite("dan", "eve");
        rig.drain("dan");
        rig.drain("eve");

        // Dan gets paired through matchmaking before Eve answers.
        rig.pair("dan", "frank");

        rig.coordinator.respond("eve", true);
        assert_eq!(rig.drain("eve"), [ServerMessage::InviterBusy]);
        assert!(rig.drain("dan").is_empty());
        assert!(!rig.coordinator.in_match("eve"));
        assert!(rig.coordinator.pending_invitations.is_empty());
    }

    #[test]
    fn invitation_to_a_busy_player_queues_and_resurfaces() {
        let mut rig = TestRig::new("invite-queue");
        rig.join("dan");
        rig.join("eve");
        rig.join("frank");
        rig.pair("eve", "frank");

        rig.coordinator.invite("dan", "eve");
        assert_eq!(
            rig.drain("dan"),
            [ServerMessage::InvitationQueued {
                to: "eve".to_owned()
            }]
        );

        // Frank takes the match 3-0; once it ends, Dan's invitation goes
        // live again.
        for _ in 0..3 {
            rig.coordinator.submit_move("eve", Move::Rock);
            rig.coordinator.submit_move("frank", Move::Paper);
        }
        let eve = rig.drain("eve");
        assert!(eve.contains(&ServerMessage::QueuedInvitationReceived {
            from: "dan".to_owned()
        }));
        assert_eq!(
            rig.drain("dan"),
            [ServerMessage::QueuedInvitationActive {
                to: "eve".to_owned()
            }]
        );

        rig.coordinator.respond("eve", true);
        assert!(rig.coordinator.in_match("dan"));
        assert!(rig.coordinator.in_match("eve"));
    }

    #[test]
    fn queued_invitations_are_fifo() {
        let mut rig = TestRig::new("invite-fifo");
        for name in ["dan", "gail", "eve", "frank"] {
            rig.join(name);
        }
        rig.pair("eve", "frank");

        rig.coordinator.invite("dan", "eve");
        rig.coordinator.invite("gail", "eve");
        rig.drain("dan");
        rig.drain("gail");

        for _ in 0..3 {
            rig.coordinator.submit_move("eve", Move::Rock);
            rig.coordinator.submit_move("frank", Move::Paper);
        }

        // Dan invited first, so his invitation is the one that surfaces.
        let eve = rig.drain("eve");
        assert!(eve.contains(&ServerMessage::QueuedInvitationReceived {
            from: "dan".to_owned()
        }));
        assert_eq!(
            rig.coordinator.queued_invitations.get("eve").unwrap().len(),
            1
        );
    }

    #[test]
    fn coffee_seeker_waits_with_the_stake_advertised() {
        let mut rig = TestRig::new("coffee-wait");
        rig.join("alice");
        rig.coordinator.play_coffee("alice");
        assert_eq!(
            rig.drain("alice"),
            [
                ServerMessage::CoffeeModeEnabled,
                ServerMessage::WaitingCoffee
            ]
        );
        assert!(rig
            .coordinator
            .registry
            .get("alice")
            .unwrap()
            .coffee_bet);
    }

    #[test]
    fn plain_play_against_a_coffee_waiter_prompts_first() {
        let mut rig = TestRig::new("coffee-prompt");
        rig.join("alice");
        rig.join("bob");

        rig.coordinator.play_coffee("alice");
        rig.drain("alice");
        rig.coordinator.play("bob");

        let bob = rig.drain("bob");
        assert_eq!(
            bob,
            [
                ServerMessage::CoffeeChallenge {
                    from: "alice".to_owned()
                },
                ServerMessage::CoffeeChallengePrompt,
            ]
        );
        // No match yet; the pairing hinges on Bob's answer.
        assert!(!rig.coordinator.in_match("alice"));
        assert!(!rig.coordinator.in_match("bob"));

        rig.coordinator.respond("bob", true);
        let bob = rig.drain("bob");
        assert!(bob.contains(&ServerMessage::YouAcceptedChallenge));
        assert!(bob.contains(&ServerMessage::CoffeeBetMatch));
        assert!(bob.contains(&ServerMessage::MatchStarted {
            opponent: "alice".to_owned()
        }));
        assert!(rig
            .drain("alice")
            .contains(&ServerMessage::ChallengeAccepted {
                by: "bob".to_owned()
            }));
    }

    #[test]
    fn coffee_seeker_finds_a_plain_waiter_and_asks_them() {
        let mut rig = TestRig::new("coffee-ask-waiter");
        rig.join("alice");
        rig.join("bob");

        rig.coordinator.play("alice");
        rig.drain("alice");
        rig.coordinator.play_coffee("bob");

        assert_eq!(
            rig.drain("alice"),
            [
                ServerMessage::CoffeeChallenge {
                    from: "bob".to_owned()
                },
                ServerMessage::CoffeeChallengePrompt,
            ]
        );
    }

    #[test]
    fn two_coffee_seekers_match_immediately() {
        let mut rig = TestRig::new("coffee-both");
        rig.join("alice");
        rig.join("bob");

        rig.coordinator.play_coffee("alice");
        rig.drain("alice");
        rig.coordinator.play_coffee("bob");

        let bob = rig.drain("bob");
        assert!(bob.contains(&ServerMessage::CoffeeBetMatch));
        assert!(bob.contains(&ServerMessage::MatchStarted {
            opponent: "alice".to_owned()
        }));
    }

    #[test]
    fn declined_challenge_rolls_the_requester_back() {
        let mut rig = TestRig::new("coffee-decline");
        rig.join("alice");
        rig.join("bob");

        rig.coordinator.play_coffee("alice");
        rig.drain("alice");
        rig.coordinator.play("bob");
        rig.drain("bob");

        rig.coordinator.respond("bob", false);
        assert_eq!(rig.drain("bob"), [ServerMessage::YouDeclinedChallenge]);
        let alice = rig.drain("alice");
        assert!(alice.contains(&ServerMessage::ChallengeDeclined {
            by: "bob".to_owned()
        }));
        assert!(alice.contains(&ServerMessage::CoffeeModeDisabled));

        let player = rig.coordinator.registry.get("alice").unwrap();
        assert!(!player.coffee_bet);
        assert!(!player.waiting_for_match);
    }

    #[test]
    fn disconnect_mid_match_frees_the_opponent() {
        let mut rig = TestRig::new("disconnect");
        rig.join("alice");
        rig.join("bob");
        rig.pair("alice", "bob");
        rig.coordinator.submit_move("bob", Move::Rock);
        rig.drain("bob");

        rig.coordinator.remove("alice");
        assert_eq!(rig.drain("bob"), [ServerMessage::OpponentDisconnected]);
        assert!(rig.coordinator.matches.is_empty());
        assert!(rig.coordinator.moves.is_empty());
        assert!(rig.coordinator.round_wins.is_empty());

        // The survivor can pair again straight away.
        rig.coordinator.play("bob");
        assert_eq!(rig.drain("bob"), [ServerMessage::Waiting]);
    }

    #[test]
    fn disconnect_purges_pending_state_in_both_roles() {
        let mut rig = TestRig::new("disconnect-pending");
        for name in ["alice", "bob", "carol", "dan", "eve"] {
            rig.join(name);
        }

        // alice has invited bob, carol has invited alice, and alice is
        // queued against the busy pair dan/eve.
        rig.coordinator.invite("alice", "bob");
        rig.coordinator.invite("carol", "alice");
        rig.pair("dan", "eve");
        rig.coordinator.invite("alice", "dan");
        rig.coordinator.play_coffee("bob");
        rig.drain("bob");
        rig.coordinator.play("alice");
        rig.drain("alice");

        rig.coordinator.remove("alice");

        assert!(rig.coordinator.pending_invitations.is_empty());
        assert!(rig.coordinator.pending_coffee.is_empty());
        assert!(!rig
            .coordinator
            .queued_invitations
            .values()
            .flatten()
            .any(|n| n == "alice"));
        assert!(!rig.coordinator.registry.contains("alice"));
    }

    #[test]
    fn disconnect_services_the_survivors_queue() {
        let mut rig = TestRig::new("disconnect-queue");
        rig.join("alice");
        rig.join("bob");
        rig.join("dan");
        rig.pair("alice", "bob");
        rig.coordinator.invite("dan", "bob");
        rig.drain("dan");

        rig.coordinator.remove("alice");

        let bob = rig.drain("bob");
        assert!(bob.contains(&ServerMessage::OpponentDisconnected));
        assert!(bob.contains(&ServerMessage::QueuedInvitationReceived {
            from: "dan".to_owned()
        }));
        assert_eq!(
            rig.drain("dan"),
            [ServerMessage::QueuedInvitationActive {
                to: "bob".to_owned()
            }]
        );
    }

    #[test]
    fn score_and_players_answer_the_caller() {
        let mut rig = TestRig::new("queries");
        rig.join("alice");
        rig.join("bob");

        rig.coordinator.score("alice");
        assert_eq!(rig.drain("alice"), [ServerMessage::Score { score: 0 }]);

        rig.coordinator.players("bob");
        assert_eq!(
            rig.drain("bob"),
            [ServerMessage::Players {
                names: vec!["alice".to_owned(), "bob".to_owned()]
            }]
        );
    }

    #[test]
    fn start_match_refuses_matched_players() {
        let mut rig = TestRig::new("defensive");
        rig.join("alice");
        rig.join("bob");
        rig.join("carol");
        rig.pair("alice", "bob");

        rig.coordinator.start_match("alice", "carol");
        assert_eq!(rig.coordinator.matches.get("alice"), Some(&"bob".to_owned()));
        assert!(!rig.coordinator.in_match("carol"));
    }
}
