use fairtable_core::PlayerId;
use serde::{Deserialize, Serialize};

use crate::player::Player;

/// A pot and the players who can win it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: u64,
    pub eligible: Vec<PlayerId>,
}

/// Rebuild main and side pots from what every seat has committed.
///
/// Layers are cut at each all-in player's bet and at the top bet. A live
/// player is eligible for a layer if they reached into it or can still
/// match it. Folded players' chips stay in the pots they fed.
/// `dead_money` (chips of expelled players) goes to the main pot.
pub fn compute_pots(players: &[Player], dead_money: u64) -> Vec<Pot> {
    let top = players.iter().map(|p| p.current_bet).max().unwrap_or(0);

    let mut levels: Vec<u64> = players
        .iter()
        .filter(|p| p.is_all_in() && p.current_bet < top)
        .map(|p| p.current_bet)
        .collect();
    levels.push(top);
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut floor = 0;
    for level in levels {
        let amount: u64 = players
            .iter()
            .map(|p| p.current_bet.min(level) - p.current_bet.min(floor))
            .sum();
        let eligible = players
            .iter()
            .filter(|p| !p.folded && (p.current_bet > floor || !p.is_all_in()))
            .filter(|p| p.current_bet >= level || p.stack > 0)
            .map(|p| p.id.clone())
            .collect();

        if pots.is_empty() || amount > 0 {
            pots.push(Pot { amount, eligible });
        }
        floor = level;
    }

    if let Some(main) = pots.first_mut() {
        main.amount += dead_money;
    }
    pots
}
