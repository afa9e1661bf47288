//! Unattended play: a fixed betting policy and the hand-by-hand table loop
//! shared by `run` and `simulate`.

use fairtable_consensus::{
    ChopEvaluator, ConsensusError, Node, NodeStatus, RoundOutcome, Transport,
};
use fairtable_core::{ActionKind, PlayerId};
use fairtable_rpc::TableView;
use fairtable_state::Session;
use tracing::{info, warn};

use crate::dealer::SeededDeck;

/// Check if free, else call if affordable, else fold. The first player to
/// act in a hand opens with `opening_bet`; once every live player has acted
/// and the bets are level, the player on turn calls the showdown.
#[derive(Debug, Clone, Copy)]
pub struct Autopilot {
    pub opening_bet: u64,
}

impl Autopilot {
    pub fn new(opening_bet: u64) -> Self {
        Autopilot { opening_bet }
    }

    /// `hand_actions` counts commits since the hand started
    pub fn choose(&self, session: &Session, me: &PlayerId, hand_actions: u64) -> (ActionKind, u64) {
        let Some(player) = session.player(me) else {
            return (ActionKind::Fold, 0);
        };
        let highest = session.highest_bet();
        let level = session
            .players()
            .iter()
            .filter(|p| !p.folded)
            .all(|p| p.current_bet == highest || p.stack == 0);

        if hand_actions >= session.live_players() as u64 && level {
            return (ActionKind::Showdown, 0);
        }
        if player.current_bet == highest {
            if hand_actions == 0 && self.opening_bet > 0 && player.stack >= self.opening_bet {
                return (ActionKind::Bet, self.opening_bet);
            }
            return (ActionKind::Check, 0);
        }
        if player.stack >= highest - player.current_bet {
            (ActionKind::Call, 0)
        } else {
            (ActionKind::Fold, 0)
        }
    }
}

/// What a table loop did before it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub rounds: u64,
    pub hands: u64,
    pub expelled: bool,
}

async fn publish<T: Transport>(node: &Node<T>, view: Option<&TableView>) -> NodeStatus {
    let status = node.status().await;
    if let Some(view) = view {
        view.publish(status.clone(), node.roster().await).await;
    }
    status
}

/// Play up to `max_rounds` consensus rounds, hand after hand, until the
/// round budget runs out, fewer than two players have chips, or this node is
/// expelled.
pub async fn run_table<T: Transport>(
    node: &Node<T>,
    policy: Autopilot,
    max_rounds: u64,
    view: Option<&TableView>,
) -> Result<TableSummary, ConsensusError> {
    let me = node.local_id().await;
    let mut summary = TableSummary {
        rounds: 0,
        hands: 1,
        expelled: false,
    };

    let session = node.session().await;
    node.deal_hand(&SeededDeck::for_hand(session.round_id())).await?;
    let mut hand_start = session.commit_count();
    publish(node, view).await;

    while summary.rounds < max_rounds {
        let session = node.session().await;

        if session.is_hand_over() || session.live_players() <= 1 {
            if session.total_pot() > 0 {
                node.settle_hand(&ChopEvaluator).await?;
            }
            let session = node.session().await;
            let funded = session.players().iter().filter(|p| p.stack > 0).count();
            if funded < 2 {
                info!("Table finished after {} hands", summary.hands);
                break;
            }

            summary.hands += 1;
            let round_id = format!("hand-{}", summary.hands);
            node.start_hand(round_id.as_str()).await?;
            node.deal_hand(&SeededDeck::for_hand(&round_id)).await?;
            hand_start = session.commit_count();
            publish(node, view).await;
            continue;
        }

        let my_turn = session.current_player().is_some_and(|p| p.id == me);
        let outcome = if my_turn {
            let hand_actions = session.commit_count() - hand_start;
            let (kind, amount) = policy.choose(&session, &me, hand_actions);
            info!("Autopilot plays {} {}", kind, amount);
            node.act(kind, amount).await?
        } else {
            node.wait_for_proposal().await?
        };
        summary.rounds += 1;

        match &outcome {
            RoundOutcome::Expelled(cert) => {
                warn!("Expelled from the table: {}", cert.reasons);
                summary.expelled = true;
                publish(node, view).await;
                break;
            }
            RoundOutcome::NoQuorum { .. } | RoundOutcome::Rejected { .. } => {
                warn!("Round {} undecided, retrying", summary.rounds);
            }
            RoundOutcome::Committed(_) | RoundOutcome::Banned(_) => {}
        }
        publish(node, view).await;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairtable_core::{Action, KeyPair};
    use fairtable_state::Seat;

    fn session() -> Session {
        let seats = vec![Seat::new("p0", 100), Seat::new("p1", 100), Seat::new("p2", 5)];
        Session::new("hand-1", seats, 2).unwrap()
    }

    fn apply(session: &mut Session, who: &str, kind: ActionKind, amount: u64) {
        let kp = KeyPair::from_seed(&[1; 32]);
        let action = Action::new_signed("hand-1", who.into(), kind, amount, &kp.secret).unwrap();
        session.apply(&action).unwrap();
    }

    #[test]
    fn test_opening_bet_then_call_or_fold() {
        let policy = Autopilot::new(10);
        let mut session = session();
        assert_eq!(policy.choose(&session, &"p0".into(), 0), (ActionKind::Bet, 10));

        apply(&mut session, "p0", ActionKind::Bet, 10);
        assert_eq!(policy.choose(&session, &"p1".into(), 1), (ActionKind::Call, 0));

        apply(&mut session, "p1", ActionKind::Call, 0);
        // p2 holds 5 chips and owes 10
        assert_eq!(policy.choose(&session, &"p2".into(), 2), (ActionKind::Fold, 0));

        apply(&mut session, "p2", ActionKind::Fold, 0);
        assert_eq!(policy.choose(&session, &"p0".into(), 3), (ActionKind::Showdown, 0));
    }

    #[test]
    fn test_checks_when_free() {
        let policy = Autopilot::new(0);
        let mut session = session();
        assert_eq!(policy.choose(&session, &"p0".into(), 0), (ActionKind::Check, 0));
        apply(&mut session, "p0", ActionKind::Check, 0);
        assert_eq!(policy.choose(&session, &"p1".into(), 1), (ActionKind::Check, 0));
        assert_eq!(policy.choose(&session, &"zed".into(), 1), (ActionKind::Fold, 0));
    }
}
