use std::sync::Mutex;

use async_trait::async_trait;
use fairtable_consensus::{CardDealer, ConsensusError};
use fairtable_core::{hash_blake3, Card, CardId, PlayerId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const DECK_SIZE: u8 = 52;

/// Deck shuffled from the hand id, so every member deals the same cards
/// without talking to each other. Cards are visible to all members.
pub struct SeededDeck {
    deck: Vec<u8>,
    next: Mutex<usize>,
}

impl SeededDeck {
    pub fn for_hand(round_id: &str) -> Self {
        let mut rng = StdRng::from_seed(hash_blake3(round_id.as_bytes()).0);
        let mut deck: Vec<u8> = (0..DECK_SIZE).collect();
        deck.shuffle(&mut rng);
        SeededDeck {
            deck,
            next: Mutex::new(0),
        }
    }
}

#[async_trait]
impl CardDealer for SeededDeck {
    async fn draw_card(&self, _drawer: &PlayerId) -> Result<CardId, ConsensusError> {
        let mut next = self
            .next
            .lock()
            .map_err(|_| ConsensusError::Dealing("deck lock poisoned".to_string()))?;
        if *next >= self.deck.len() {
            return Err(ConsensusError::Dealing("deck exhausted".to_string()));
        }
        let id = CardId(*next as u32);
        *next += 1;
        Ok(id)
    }

    async fn open_card(&self, _owner: &PlayerId, card: CardId) -> Result<Card, ConsensusError> {
        self.deck
            .get(card.0 as usize)
            .map(|&c| Card(c))
            .ok_or_else(|| ConsensusError::Dealing(format!("no card {}", card.0)))
    }
}
