use std::collections::{BTreeMap, HashSet};

use fairtable_core::serialize::to_canonical_bytes;
use fairtable_core::{hash_blake3, Action, Card, Digest, PlayerId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RuleViolation, StateError};
use crate::player::{Player, Seat};
use crate::pot::{compute_pots, Pot};
use crate::rules::{self, Effect, HighestBet};

const HOLE_CARDS: usize = 2;
const BOARD_CARDS: usize = 5;

/// Shared table state for one hand.
///
/// Fields are private: state moves forward through `apply` for committed
/// actions, `remove_player` for verified bans, and the dealing/settlement
/// helpers that every peer drives identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    round_id: String,
    players: Vec<Player>,
    board: Vec<Card>,
    pots: Vec<Pot>,
    highest_bet: u64,
    dealer: usize,
    turn: usize,
    commits: u64,
    /// Chips left behind by expelled players
    dead_money: u64,
    hand_over: bool,
}

impl Session {
    /// Open a table. The first player to act sits left of the dealer.
    pub fn new(round_id: impl Into<String>, seats: Vec<Seat>, dealer: usize) -> Result<Self, StateError> {
        if seats.is_empty() {
            return Err(StateError::EmptyTable);
        }
        if dealer >= seats.len() {
            return Err(StateError::DealerOutOfRange {
                dealer,
                players: seats.len(),
            });
        }

        let mut seen = HashSet::new();
        for seat in &seats {
            if !seen.insert(seat.id.clone()) {
                return Err(StateError::DuplicatePlayer(seat.id.clone()));
            }
        }

        let players: Vec<Player> = seats
            .into_iter()
            .enumerate()
            .map(|(rank, seat)| Player::new(seat, rank as u32))
            .collect();
        let turn = (dealer + 1) % players.len();

        let mut session = Session {
            round_id: round_id.into(),
            players,
            board: Vec::with_capacity(BOARD_CARDS),
            pots: Vec::new(),
            highest_bet: 0,
            dealer,
            turn,
            commits: 0,
            dead_money: 0,
            hand_over: false,
        };
        session.pots = compute_pots(&session.players, 0);
        Ok(session)
    }

    pub fn round_id(&self) -> &str {
        &self.round_id
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn index_of(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn current_turn(&self) -> usize {
        self.turn
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.turn)
    }

    pub fn dealer(&self) -> usize {
        self.dealer
    }

    pub fn highest_bet(&self) -> u64 {
        self.highest_bet
    }

    pub fn pots(&self) -> &[Pot] {
        &self.pots
    }

    pub fn total_pot(&self) -> u64 {
        self.pots.iter().map(|p| p.amount).sum()
    }

    pub fn board(&self) -> &[Card] {
        &self.board
    }

    /// Number of actions applied so far; peers compare it to spot a gap
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    pub fn is_hand_over(&self) -> bool {
        self.hand_over
    }

    pub fn live_players(&self) -> usize {
        self.players.iter().filter(|p| !p.folded).count()
    }

    /// BLAKE3 fingerprint of the canonical encoding
    pub fn digest(&self) -> Result<Digest, StateError> {
        Ok(hash_blake3(&to_canonical_bytes(self)?))
    }

    /// Legality predicate shared by proposer, voters and committers
    pub fn validate(&self, action: &Action) -> Result<Effect, RuleViolation> {
        if action.round_id != self.round_id {
            return Err(RuleViolation::WrongRound {
                expected: self.round_id.clone(),
                got: action.round_id.clone(),
            });
        }
        let index = self
            .index_of(&action.player)
            .ok_or_else(|| RuleViolation::UnknownPlayer(action.player.clone()))?;
        if index != self.turn {
            return Err(RuleViolation::OutOfTurn(action.player.clone()));
        }
        if self.hand_over {
            return Err(RuleViolation::HandOver);
        }

        let actor = &self.players[index];
        if actor.folded {
            return Err(RuleViolation::AlreadyFolded);
        }
        rules::check(action, actor, self.highest_bet)
    }

    /// Apply a committed action. On error nothing has changed.
    pub fn apply(&mut self, action: &Action) -> Result<Effect, StateError> {
        let effect = self.validate(action)?;
        let index = self.turn;

        match effect {
            Effect::Fold => {
                self.players[index].folded = true;
                self.recompute_pots();
                self.advance_turn(index);
            }
            Effect::Check => self.advance_turn(index),
            Effect::Wager { chips, highest } => {
                let player = &mut self.players[index];
                player.stack -= chips;
                player.current_bet += chips;
                let new_bet = player.current_bet;
                match highest {
                    HighestBet::AtLeast => self.highest_bet = self.highest_bet.max(new_bet),
                    HighestBet::Set => self.highest_bet = new_bet,
                    HighestBet::Unchanged => {}
                }
                self.recompute_pots();
                self.advance_turn(index);
            }
            Effect::Showdown => self.hand_over = true,
        }

        self.commits += 1;
        debug!(
            "Applied {} by {} (commit #{}, pot {})",
            action.kind,
            action.player,
            self.commits,
            self.total_pot()
        );
        Ok(effect)
    }

    /// Next non-folded seat after `from`, wrapping. Stays put if nobody else is live.
    fn advance_turn(&mut self, from: usize) {
        let n = self.players.len();
        if let Some(next) = (1..n).map(|step| (from + step) % n).find(|&i| !self.players[i].folded) {
            self.turn = next;
        }
    }

    fn recompute_pots(&mut self) {
        self.pots = compute_pots(&self.players, self.dead_money);
    }

    /// Remove an expelled player and repair every derived index in one step.
    ///
    /// Their committed chips become dead money in the main pot. The turn stays
    /// with the same player where possible, and never points past the table.
    pub fn remove_player(&mut self, id: &PlayerId) -> Result<Player, StateError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| StateError::PlayerNotFound(id.clone()))?;
        let removed = self.players.remove(index);
        self.dead_money += removed.current_bet;

        if self.players.is_empty() {
            self.turn = 0;
            self.dealer = 0;
        } else {
            let len = self.players.len();
            if index < self.turn {
                self.turn -= 1;
            }
            if index < self.dealer {
                self.dealer -= 1;
            }
            if self.turn >= len {
                self.turn = 0;
            }
            if self.dealer >= len {
                self.dealer = 0;
            }
            if self.players[self.turn].folded {
                self.advance_turn(self.turn);
            }
        }

        self.highest_bet = self.players.iter().map(|p| p.current_bet).max().unwrap_or(0);
        self.recompute_pots();
        Ok(removed)
    }

    pub fn deal_hole_card(&mut self, id: &PlayerId, card: Card) -> Result<(), StateError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| StateError::PlayerNotFound(id.clone()))?;
        if player.hand.len() >= HOLE_CARDS {
            return Err(StateError::HandFull(id.clone()));
        }
        player.hand.push(card);
        Ok(())
    }

    pub fn deal_board_card(&mut self, card: Card) -> Result<(), StateError> {
        if self.board.len() >= BOARD_CARDS {
            return Err(StateError::BoardFull);
        }
        self.board.push(card);
        Ok(())
    }

    /// Pay out a finished hand. Payouts must account for every chip in the pots.
    pub fn settle(&mut self, payouts: &BTreeMap<PlayerId, u64>) -> Result<(), StateError> {
        if !self.hand_over && self.live_players() > 1 {
            return Err(StateError::HandInProgress);
        }
        let paid: u64 = payouts.values().sum();
        let pot = self.total_pot();
        if paid != pot {
            return Err(StateError::SettlementMismatch { paid, pot });
        }
        if let Some(unknown) = payouts.keys().find(|id| !self.contains(id)) {
            return Err(StateError::PlayerNotFound(unknown.clone()));
        }

        for player in &mut self.players {
            player.stack += payouts.get(&player.id).copied().unwrap_or(0);
            player.current_bet = 0;
        }
        self.dead_money = 0;
        self.highest_bet = 0;
        self.hand_over = true;
        self.recompute_pots();
        Ok(())
    }

    /// Begin the next hand after settlement: the button moves one seat and
    /// players without chips sit the hand out.
    pub fn start_hand(&mut self, round_id: impl Into<String>) -> Result<(), StateError> {
        if self.total_pot() > 0 {
            return Err(StateError::HandInProgress);
        }
        if self.players.is_empty() {
            return Err(StateError::EmptyTable);
        }

        for player in &mut self.players {
            player.hand.clear();
            player.current_bet = 0;
            player.folded = player.stack == 0;
        }
        self.round_id = round_id.into();
        self.board.clear();
        self.highest_bet = 0;
        self.hand_over = false;
        self.dealer = (self.dealer + 1) % self.players.len();
        self.turn = self.dealer;
        self.advance_turn(self.dealer);
        self.recompute_pots();
        Ok(())
    }
}
