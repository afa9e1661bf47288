//! Services the engine consumes but does not implement: the card-dealing
//! sub-protocol and hand evaluation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use fairtable_core::{Card, CardId, PlayerId};
use fairtable_state::Session;

use crate::error::ConsensusError;

/// Card-dealing sub-protocol. Cards are opaque to the engine.
#[async_trait]
pub trait CardDealer: Send + Sync {
    /// Draw the next card from the shared deck on behalf of `drawer`
    async fn draw_card(&self, drawer: &PlayerId) -> Result<CardId, ConsensusError>;

    /// Reveal a drawn card to its owner
    async fn open_card(&self, owner: &PlayerId, card: CardId) -> Result<Card, ConsensusError>;
}

/// Winner selection for a finished hand
pub trait HandEvaluator: Send + Sync {
    /// Payout per player. Must account for every chip in the session's pots.
    fn evaluate(&self, session: &Session) -> BTreeMap<PlayerId, u64>;
}

/// Splits every pot evenly among its eligible players. The odd chips go to
/// the first eligible seat. A pot nobody is eligible for goes to the first
/// live player, or the first seat if everyone folded.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChopEvaluator;

impl HandEvaluator for ChopEvaluator {
    fn evaluate(&self, session: &Session) -> BTreeMap<PlayerId, u64> {
        let mut payouts: BTreeMap<PlayerId, u64> = BTreeMap::new();
        let fallback = session
            .players()
            .iter()
            .find(|p| !p.folded)
            .or_else(|| session.players().first())
            .map(|p| p.id.clone());

        for pot in session.pots() {
            if pot.amount == 0 {
                continue;
            }
            if pot.eligible.is_empty() {
                if let Some(id) = &fallback {
                    *payouts.entry(id.clone()).or_default() += pot.amount;
                }
                continue;
            }

            let share = pot.amount / pot.eligible.len() as u64;
            let remainder = pot.amount % pot.eligible.len() as u64;
            for (i, id) in pot.eligible.iter().enumerate() {
                let extra = if i == 0 { remainder } else { 0 };
                *payouts.entry(id.clone()).or_default() += share + extra;
            }
        }
        payouts
    }
}
