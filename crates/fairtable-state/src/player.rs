use fairtable_core::{Card, PlayerId};
use serde::{Deserialize, Serialize};

/// Seat description used to open a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: PlayerId,
    pub name: String,
    pub stack: u64,
}

impl Seat {
    pub fn new(id: impl Into<PlayerId>, stack: u64) -> Self {
        let id = id.into();
        Seat {
            name: id.to_string(),
            id,
            stack,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Seat order at the time the table opened
    pub rank: u32,
    pub hand: Vec<Card>,
    pub folded: bool,
    /// Chips committed this hand
    pub current_bet: u64,
    /// Chips still behind
    pub stack: u64,
}

impl Player {
    pub fn new(seat: Seat, rank: u32) -> Self {
        Player {
            id: seat.id,
            name: seat.name,
            rank,
            hand: Vec::with_capacity(2),
            folded: false,
            current_bet: 0,
            stack: seat.stack,
        }
    }

    /// Still in the hand with nothing left behind
    pub fn is_all_in(&self) -> bool {
        !self.folded && self.stack == 0 && self.current_bet > 0
    }
}
