//! Per-kind legality checks and the effects they authorise.
//!
//! Each `ActionKind` has exactly one check function. A check either rejects
//! the action or returns the `Effect` that `Session::apply` will carry out,
//! so the predicate voters evaluate and the mutation committers perform can
//! never drift apart.

use fairtable_core::{Action, ActionKind};

use crate::error::RuleViolation;
use crate::player::Player;

/// What a legal action does to the acting player and the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Fold,
    Check,
    /// Move `chips` from stack to bet, then update the highest bet
    Wager { chips: u64, highest: HighestBet },
    Showdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighestBet {
    /// Raise to the player's new bet if it is larger
    AtLeast,
    /// Set to the player's new bet
    Set,
    Unchanged,
}

/// Evaluate the kind-specific rule for `actor` against `highest_bet`
pub fn check(action: &Action, actor: &Player, highest_bet: u64) -> Result<Effect, RuleViolation> {
    match action.kind {
        ActionKind::Fold => Ok(Effect::Fold),
        ActionKind::Check => check_check(actor, highest_bet),
        ActionKind::Bet => check_bet(action.amount, actor),
        ActionKind::Raise => check_raise(action.amount, actor, highest_bet),
        ActionKind::Call => check_call(actor, highest_bet),
        ActionKind::AllIn => check_all_in(action.amount, actor),
        ActionKind::Showdown => Ok(Effect::Showdown),
    }
}

fn ensure_funds(actor: &Player, need: u64) -> Result<(), RuleViolation> {
    if actor.stack < need {
        return Err(RuleViolation::InsufficientFunds {
            have: actor.stack,
            need,
        });
    }
    Ok(())
}

fn check_check(actor: &Player, highest_bet: u64) -> Result<Effect, RuleViolation> {
    if actor.current_bet != highest_bet {
        return Err(RuleViolation::IllegalCheck {
            bet: actor.current_bet,
            highest: highest_bet,
        });
    }
    Ok(Effect::Check)
}

fn check_bet(amount: u64, actor: &Player) -> Result<Effect, RuleViolation> {
    if amount == 0 {
        return Err(RuleViolation::ZeroBet);
    }
    ensure_funds(actor, amount)?;
    Ok(Effect::Wager {
        chips: amount,
        highest: HighestBet::AtLeast,
    })
}

fn check_raise(amount: u64, actor: &Player, highest_bet: u64) -> Result<Effect, RuleViolation> {
    if amount == 0 {
        return Err(RuleViolation::ZeroBet);
    }
    ensure_funds(actor, amount)?;
    let new_bet = actor.current_bet + amount;
    if new_bet < highest_bet {
        return Err(RuleViolation::RaiseBelowHighest {
            bet: new_bet,
            highest: highest_bet,
        });
    }
    Ok(Effect::Wager {
        chips: amount,
        highest: HighestBet::Set,
    })
}

fn check_call(actor: &Player, highest_bet: u64) -> Result<Effect, RuleViolation> {
    let owed = highest_bet.saturating_sub(actor.current_bet);
    ensure_funds(actor, owed)?;
    Ok(Effect::Wager {
        chips: owed,
        highest: HighestBet::Unchanged,
    })
}

fn check_all_in(amount: u64, actor: &Player) -> Result<Effect, RuleViolation> {
    let expected = actor.stack + actor.current_bet;
    if amount != expected {
        return Err(RuleViolation::AllInMismatch {
            declared: amount,
            expected,
        });
    }
    Ok(Effect::Wager {
        chips: actor.stack,
        highest: HighestBet::AtLeast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Seat;

    fn actor(bet: u64, stack: u64) -> Player {
        let mut p = Player::new(Seat::new("alice", stack), 0);
        p.current_bet = bet;
        p
    }

    fn action(kind: ActionKind, amount: u64) -> Action {
        Action::new("hand-1", "alice".into(), kind, amount)
    }

    #[test]
    fn test_bet_needs_funds() {
        let err = check(&action(ActionKind::Bet, 110), &actor(0, 100), 0).unwrap_err();
        assert_eq!(err, RuleViolation::InsufficientFunds { have: 100, need: 110 });
        assert!(err.to_string().starts_with("insufficient funds"));
    }

    #[test]
    fn test_check_only_when_matched() {
        assert_eq!(check(&action(ActionKind::Check, 0), &actor(10, 90), 10), Ok(Effect::Check));
        assert!(matches!(
            check(&action(ActionKind::Check, 0), &actor(0, 90), 10),
            Err(RuleViolation::IllegalCheck { .. })
        ));
    }

    #[test]
    fn test_raise_must_reach_highest() {
        assert!(matches!(
            check(&action(ActionKind::Raise, 5), &actor(0, 100), 10),
            Err(RuleViolation::RaiseBelowHighest { bet: 5, highest: 10 })
        ));
        assert_eq!(
            check(&action(ActionKind::Raise, 20), &actor(0, 100), 10),
            Ok(Effect::Wager {
                chips: 20,
                highest: HighestBet::Set
            })
        );
    }

    #[test]
    fn test_call_pays_difference() {
        assert_eq!(
            check(&action(ActionKind::Call, 0), &actor(4, 100), 10),
            Ok(Effect::Wager {
                chips: 6,
                highest: HighestBet::Unchanged
            })
        );
        assert!(matches!(
            check(&action(ActionKind::Call, 0), &actor(0, 5), 10),
            Err(RuleViolation::InsufficientFunds { have: 5, need: 10 })
        ));
    }

    #[test]
    fn test_all_in_amount_must_match() {
        assert!(matches!(
            check(&action(ActionKind::AllIn, 50), &actor(10, 100), 10),
            Err(RuleViolation::AllInMismatch { declared: 50, expected: 110 })
        ));
        assert_eq!(
            check(&action(ActionKind::AllIn, 110), &actor(10, 100), 10),
            Ok(Effect::Wager {
                chips: 100,
                highest: HighestBet::AtLeast
            })
        );
    }
}
