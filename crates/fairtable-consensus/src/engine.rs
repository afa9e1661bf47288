//! Per-node consensus state: proposal and vote caches, roster, quorum and
//! the session they protect.
//!
//! The engine is synchronous. `Node` drives it through the transport and
//! holds it behind a lock for the whole of each round.

use std::collections::{BTreeMap, HashMap};

use fairtable_core::serialize::from_wire;
use fairtable_core::{
    join_distinct_reasons, Action, ActionKind, BanCertificate, Card, CommitCertificate, KeyPair,
    PlayerId, ProposalId, ProposalMsg, VoteMsg, VoteValue,
};
use fairtable_state::{RuleViolation, Session};
use tracing::{debug, error, info, warn};

use crate::certificate::{verify_ban_certificate, verify_commit_certificate};
use crate::collaborators::HandEvaluator;
use crate::error::ConsensusError;
use crate::outcome::RoundOutcome;
use crate::quorum::quorum_for;
use crate::roster::Roster;
use crate::tally::VoteTally;

/// A cached proposal awaiting a decision
#[derive(Debug, Clone)]
struct Round {
    proposal: ProposalMsg,
    /// Broadcast root, when a rejection can be pinned on it. `None` for
    /// payloads the root's key does not vouch for.
    accused: Option<PlayerId>,
    tally: VoteTally,
}

/// A node's judgement of one proposal
#[derive(Debug, Clone)]
struct Verdict {
    value: VoteValue,
    reason: String,
    /// The root signed this action for the current hand and must answer for it
    attributable: bool,
}

impl Verdict {
    fn accept() -> Self {
        Verdict {
            value: VoteValue::Accept,
            reason: "valid".to_string(),
            attributable: true,
        }
    }

    fn reject(reason: impl Into<String>, attributable: bool) -> Self {
        Verdict {
            value: VoteValue::Reject,
            reason: reason.into(),
            attributable,
        }
    }
}

pub struct Engine {
    me: PlayerId,
    keypair: KeyPair,
    roster: Roster,
    quorum: usize,
    rounds: HashMap<ProposalId, Round>,
    decided: HashMap<ProposalId, RoundOutcome>,
    session: Session,
    expelled: bool,
}

impl Engine {
    pub fn new(
        me: PlayerId,
        keypair: KeyPair,
        roster: Roster,
        session: Session,
    ) -> Result<Self, ConsensusError> {
        let seated: Vec<PlayerId> = session.players().iter().map(|p| p.id.clone()).collect();
        if roster.ids() != seated {
            return Err(ConsensusError::RosterMismatch(
                "roster and session seat different players".to_string(),
            ));
        }
        match roster.key_of(&me) {
            Some(key) if *key == keypair.public => {}
            Some(_) => {
                return Err(ConsensusError::RosterMismatch(format!(
                    "roster key for {me} does not match local keypair"
                )))
            }
            None => return Err(ConsensusError::PlayerNotInSession(me)),
        }

        let quorum = quorum_for(session.player_count());
        Ok(Engine {
            me,
            keypair,
            roster,
            quorum,
            rounds: HashMap::new(),
            decided: HashMap::new(),
            session,
            expelled: false,
        })
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.me
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Quorum for proposals cached from now on
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn is_expelled(&self) -> bool {
        self.expelled
    }

    /// Player whose turn it is, and therefore the next broadcast root
    pub fn next_to_act(&self) -> Option<PlayerId> {
        self.session.current_player().map(|p| p.id.clone())
    }

    pub fn is_my_turn(&self) -> bool {
        self.next_to_act().as_ref() == Some(&self.me)
    }

    pub fn decision(&self, id: &ProposalId) -> Option<&RoundOutcome> {
        self.decided.get(id)
    }

    fn ensure_active(&self) -> Result<(), ConsensusError> {
        if self.expelled {
            return Err(ConsensusError::Expelled);
        }
        Ok(())
    }

    /// Sign an action for the local player in the current round
    pub fn sign_action(&self, kind: ActionKind, amount: u64) -> Result<Action, ConsensusError> {
        let action = Action::new_signed(
            self.session.round_id(),
            self.me.clone(),
            kind,
            amount,
            &self.keypair.secret,
        )?;
        Ok(action)
    }

    /// Check the local player may propose `action` now, then cache it.
    /// Nothing is cached on error.
    pub fn prepare_proposal(&mut self, action: Action) -> Result<ProposalMsg, ConsensusError> {
        self.ensure_active()?;
        if action.player != self.me {
            return Err(ConsensusError::ForeignAction {
                action: action.player,
                local: self.me.clone(),
            });
        }
        let index = self
            .session
            .index_of(&self.me)
            .ok_or_else(|| ConsensusError::PlayerNotInSession(self.me.clone()))?;
        if index != self.session.current_turn() {
            return Err(ConsensusError::OutOfTurn(self.me.clone()));
        }

        let proposal = ProposalMsg::new(action)?;
        info!(
            "Proposing {} {} as {}",
            proposal.action.as_ref().map(|a| a.kind.to_string()).unwrap_or_default(),
            proposal.action.as_ref().map(|a| a.amount).unwrap_or_default(),
            proposal.proposal_id.short()
        );
        self.open_round(proposal.clone(), Some(self.me.clone()));
        Ok(proposal)
    }

    /// Cache a proposal. The quorum is captured here; a pending round keeps
    /// the quorum it was opened with.
    fn open_round(&mut self, proposal: ProposalMsg, accused: Option<PlayerId>) {
        let quorum = self.quorum;
        self.rounds
            .entry(proposal.proposal_id.clone())
            .or_insert_with(|| Round {
                tally: VoteTally::new(proposal.proposal_id.clone(), quorum),
                proposal,
                accused,
            });
    }

    /// Validate a proposal from `root` and produce this node's signed vote.
    /// The vote is also recorded in the local tally.
    ///
    /// Only a rejected action that `root` itself signed for the current hand
    /// can get `root` banned. Nil, forged, relabelled and replayed payloads
    /// are voted down without naming anyone.
    pub fn receive_proposal(
        &mut self,
        proposal: ProposalMsg,
        root: &PlayerId,
    ) -> Result<VoteMsg, ConsensusError> {
        self.ensure_active()?;
        let verdict = self.judge(&proposal, root);
        let vote = VoteMsg::new_signed(
            proposal.proposal_id.clone(),
            self.me.clone(),
            verdict.value,
            verdict.reason,
            &self.keypair.secret,
        )?;

        match verdict.value {
            VoteValue::Accept => debug!("Accepting {} from {}", proposal.proposal_id.short(), root),
            VoteValue::Reject => warn!(
                "Rejecting {} from {}: {}",
                proposal.proposal_id.short(),
                root,
                vote.reason
            ),
        }

        // A replayed id gets a fresh round so its rejection can be tallied.
        if self.decided.contains_key(&proposal.proposal_id) {
            self.rounds.remove(&proposal.proposal_id);
        }
        let id = proposal.proposal_id.clone();
        let accused = verdict.attributable.then(|| root.clone());
        self.open_round(proposal, accused);
        if let Some(round) = self.rounds.get_mut(&id) {
            round.tally.record(vote.clone());
        }
        Ok(vote)
    }

    /// The first failed check decides the reject reason. Everything before
    /// the rule check can be produced without the root's key, so those
    /// rejections are not attributable.
    fn judge(&self, proposal: &ProposalMsg, root: &PlayerId) -> Verdict {
        let Some(action) = proposal.action.as_ref() else {
            return Verdict::reject("nil action", false);
        };
        let Some(key) = self.roster.key_of(&action.player) else {
            return Verdict::reject("unknown-player", false);
        };
        if action.verify(key).is_err() {
            return Verdict::reject("bad-signature", false);
        }
        if proposal.signature.is_some() && proposal.signature != action.signature {
            return Verdict::reject("bad-signature", false);
        }
        match action.proposal_id() {
            Ok(id) if id == proposal.proposal_id => {}
            _ => return Verdict::reject("proposal id mismatch", false),
        }
        if &action.player != root {
            return Verdict::reject("not-root", false);
        }
        if self.decided.contains_key(&proposal.proposal_id) {
            return Verdict::reject("duplicate proposal", false);
        }
        match self.session.validate(action) {
            Ok(_) => Verdict::accept(),
            Err(violation @ RuleViolation::WrongRound { .. }) => {
                Verdict::reject(violation.to_string(), false)
            }
            Err(violation) => Verdict::reject(violation.to_string(), true),
        }
    }

    /// Merge one all-to-all vote vector and decide if a quorum is reached.
    ///
    /// Undecodable entries, unknown voters and bad signatures are dropped. A
    /// batch naming more than one proposal is rejected whole.
    pub fn receive_votes(&mut self, batch: Vec<Vec<u8>>) -> Result<RoundOutcome, ConsensusError> {
        self.ensure_active()?;

        let votes: Vec<VoteMsg> = batch
            .iter()
            .filter_map(|bytes| match from_wire::<VoteMsg>(bytes) {
                Ok(vote) => Some(vote),
                Err(e) => {
                    warn!("Dropping undecodable vote: {}", e);
                    None
                }
            })
            .collect();

        let first = votes.first().ok_or(ConsensusError::EmptyVoteBatch)?;
        let id = first.proposal_id.clone();
        if let Some(stray) = votes.iter().find(|v| v.proposal_id != id) {
            warn!(
                "Vote batch mixes {} and {}, ignoring it",
                id.short(),
                stray.proposal_id.short()
            );
            return Err(ConsensusError::MixedVoteBatch {
                expected: id,
                found: stray.proposal_id.clone(),
            });
        }

        if !self.rounds.contains_key(&id) {
            return match self.decided.get(&id) {
                Some(outcome) => Ok(outcome.clone()),
                None => Err(ConsensusError::UnknownProposal(id)),
            };
        }

        for vote in votes {
            let Some(key) = self.roster.key_of(&vote.voter) else {
                warn!("Dropping vote from unknown voter {}", vote.voter);
                continue;
            };
            if let Err(e) = vote.verify(key) {
                warn!("Dropping vote from {}: {}", vote.voter, e);
                continue;
            }
            if let Some(round) = self.rounds.get_mut(&id) {
                round.tally.record(vote);
            }
        }

        self.decide(&id)
    }

    fn decide(&mut self, id: &ProposalId) -> Result<RoundOutcome, ConsensusError> {
        let round = self
            .rounds
            .get(id)
            .ok_or_else(|| ConsensusError::UnknownProposal(id.clone()))?;

        match round.tally.decision() {
            Some(VoteValue::Accept) => {
                let cert = CommitCertificate::new(
                    round.proposal.clone(),
                    round.tally.votes_with(VoteValue::Accept),
                );
                self.apply_commit(&cert)?;
                Ok(RoundOutcome::Committed(cert))
            }
            Some(VoteValue::Reject) => match round.accused.clone() {
                Some(accused) => {
                    let cert = BanCertificate::new(
                        id.clone(),
                        accused,
                        round.tally.votes_with(VoteValue::Reject),
                    );
                    self.apply_ban(&cert)
                }
                None => {
                    let reasons =
                        join_distinct_reasons(&round.tally.votes_with(VoteValue::Reject));
                    warn!("Dropped {} without a ban: {}", id.short(), reasons);
                    let outcome = RoundOutcome::Rejected {
                        proposal_id: id.clone(),
                        reasons,
                    };
                    self.rounds.remove(id);
                    // A replay must not mask the original decision
                    self.decided.entry(id.clone()).or_insert_with(|| outcome.clone());
                    Ok(outcome)
                }
            },
            None => {
                let outcome = RoundOutcome::NoQuorum {
                    proposal_id: id.clone(),
                    accepts: round.tally.accept_count(),
                    rejects: round.tally.reject_count(),
                    quorum: round.tally.quorum(),
                };
                debug!("No quorum yet for {}: {:?}", id.short(), outcome);
                Ok(outcome)
            }
        }
    }

    /// Quorum a certificate for `id` is checked against
    fn quorum_for_proposal(&self, id: &ProposalId) -> usize {
        self.rounds
            .get(id)
            .map(|round| round.tally.quorum())
            .unwrap_or(self.quorum)
    }

    /// Re-verify a commit certificate and apply its action. The session is
    /// untouched on error.
    pub fn apply_commit(&mut self, cert: &CommitCertificate) -> Result<(), ConsensusError> {
        self.ensure_active()?;
        let id = cert.proposal_id().clone();
        if matches!(self.decided.get(&id), Some(RoundOutcome::Committed(_))) {
            return Err(ConsensusError::AlreadyCommitted(id));
        }

        if let Err(e) = self.check_and_apply(cert, &id) {
            error!("Rejected commit certificate for {}: {}", id.short(), e);
            return Err(e);
        }

        self.rounds.remove(&id);
        self.decided.insert(id, RoundOutcome::Committed(cert.clone()));
        Ok(())
    }

    fn check_and_apply(&mut self, cert: &CommitCertificate, id: &ProposalId) -> Result<(), ConsensusError> {
        verify_commit_certificate(cert, &self.roster, self.quorum_for_proposal(id))?;
        let action = cert
            .proposal
            .action
            .as_ref()
            .ok_or_else(|| ConsensusError::MalformedCertificate("nil action".to_string()))?;
        if !self.session.contains(&action.player) {
            return Err(ConsensusError::PlayerNotInSession(action.player.clone()));
        }

        self.session.apply(action)?;
        info!(
            "Committed {} {} by {} ({}, commit #{}, pot {})",
            action.kind,
            action.amount,
            action.player,
            id.short(),
            self.session.commit_count(),
            self.session.total_pot()
        );
        Ok(())
    }

    /// Re-verify a ban certificate and act on it: expel ourselves, or drop
    /// the accused and shrink the quorum for later proposals.
    pub fn apply_ban(&mut self, cert: &BanCertificate) -> Result<RoundOutcome, ConsensusError> {
        self.ensure_active()?;
        let id = cert.proposal_id.clone();
        if let Some(outcome @ (RoundOutcome::Banned(_) | RoundOutcome::Expelled(_))) =
            self.decided.get(&id)
        {
            return Ok(outcome.clone());
        }

        if let Err(e) = self.check_ban(cert) {
            error!("Rejected ban certificate for {}: {}", id.short(), e);
            return Err(e);
        }

        let outcome = if cert.accused == self.me {
            warn!("Expelled from table: {}", cert.reasons);
            self.expelled = true;
            RoundOutcome::Expelled(cert.clone())
        } else {
            self.session.remove_player(&cert.accused)?;
            self.roster.remove(&cert.accused);
            self.quorum = quorum_for(self.session.player_count());
            info!(
                "Banned {} ({}): {} members left, quorum {}",
                cert.accused,
                cert.reasons,
                self.session.player_count(),
                self.quorum
            );
            RoundOutcome::Banned(cert.clone())
        };

        self.rounds.remove(&id);
        self.decided.insert(id, outcome.clone());
        Ok(outcome)
    }

    fn check_ban(&self, cert: &BanCertificate) -> Result<(), ConsensusError> {
        if !self.roster.contains(&cert.accused) {
            return Err(ConsensusError::UnknownPlayer(cert.accused.clone()));
        }
        match self.decided.get(&cert.proposal_id) {
            Some(RoundOutcome::Rejected { .. }) => {
                return Err(ConsensusError::MalformedCertificate(format!(
                    "{} was rejected without attribution",
                    cert.proposal_id.short()
                )))
            }
            Some(RoundOutcome::Committed(_)) => {
                return Err(ConsensusError::MalformedCertificate(format!(
                    "{} was committed",
                    cert.proposal_id.short()
                )))
            }
            _ => {}
        }
        if let Some(round) = self.rounds.get(&cert.proposal_id) {
            match &round.accused {
                Some(root) if *root == cert.accused => {}
                Some(root) => {
                    return Err(ConsensusError::MalformedCertificate(format!(
                        "accuses {} but {} proposed",
                        cert.accused, root
                    )))
                }
                None => {
                    return Err(ConsensusError::MalformedCertificate(format!(
                        "accuses {} of a proposal they never signed",
                        cert.accused
                    )))
                }
            }
        }
        verify_ban_certificate(cert, &self.roster, self.quorum_for_proposal(&cert.proposal_id))
    }

    /// Pay out a finished hand with the evaluator's payouts
    pub fn settle_hand(
        &mut self,
        evaluator: &dyn HandEvaluator,
    ) -> Result<BTreeMap<PlayerId, u64>, ConsensusError> {
        let payouts = evaluator.evaluate(&self.session);
        self.session.settle(&payouts)?;
        info!("Settled hand {}: {:?}", self.session.round_id(), payouts);
        Ok(payouts)
    }

    /// Open the next hand. Pending rounds and decisions of the previous hand
    /// are dropped; its actions now fail the round check instead.
    pub fn start_hand(&mut self, round_id: impl Into<String>) -> Result<(), ConsensusError> {
        self.session.start_hand(round_id)?;
        self.rounds.clear();
        self.decided.clear();
        info!(
            "Started hand {} (dealer {}, first to act {:?})",
            self.session.round_id(),
            self.session.dealer(),
            self.next_to_act()
        );
        Ok(())
    }

    pub fn deal_hole_card(&mut self, player: &PlayerId, card: Card) -> Result<(), ConsensusError> {
        self.session.deal_hole_card(player, card)?;
        Ok(())
    }

    pub fn deal_board_card(&mut self, card: Card) -> Result<(), ConsensusError> {
        self.session.deal_board_card(card)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairtable_core::serialize::to_wire;
    use fairtable_state::Seat;

    /// `n` engines sharing one table; "p0" acts first
    fn table(n: usize, stack: u64) -> Vec<Engine> {
        let keys: Vec<KeyPair> = (0..n).map(|i| KeyPair::from_seed(&[i as u8 + 7; 32])).collect();
        let ids: Vec<PlayerId> = (0..n).map(|i| PlayerId::new(format!("p{i}"))).collect();
        let roster = Roster::new(ids.iter().cloned().zip(keys.iter().map(|k| k.public)).collect())
            .unwrap();
        let seats: Vec<Seat> = ids.iter().map(|id| Seat::new(id.clone(), stack)).collect();
        let session = Session::new("hand-1", seats, n - 1).unwrap();

        ids.into_iter()
            .zip(keys)
            .map(|(id, kp)| Engine::new(id, kp, roster.clone(), session.clone()).unwrap())
            .collect()
    }

    /// Run one full round in lockstep: proposal from `root`, all-to-all of votes
    fn round(engines: &mut [Engine], proposal: &ProposalMsg, root: &PlayerId) -> Vec<RoundOutcome> {
        let batch: Vec<Vec<u8>> = engines
            .iter_mut()
            .map(|e| to_wire(&e.receive_proposal(proposal.clone(), root).unwrap()).unwrap())
            .collect();
        engines
            .iter_mut()
            .map(|e| e.receive_votes(batch.clone()).unwrap())
            .collect()
    }

    #[test]
    fn test_new_checks_roster_against_session() {
        let engines = table(3, 100);
        let e = &engines[0];
        let other = KeyPair::generate();
        assert!(matches!(
            Engine::new("p0".into(), other, e.roster.clone(), e.session.clone()),
            Err(ConsensusError::RosterMismatch(_))
        ));
        assert!(matches!(
            Engine::new("zed".into(), KeyPair::generate(), e.roster.clone(), e.session.clone()),
            Err(ConsensusError::PlayerNotInSession(_))
        ));
        assert_eq!(e.quorum(), 2);
    }

    #[test]
    fn test_prepare_proposal_preconditions() {
        let mut engines = table(3, 100);
        let action = engines[1].sign_action(ActionKind::Bet, 10).unwrap();
        assert!(matches!(
            engines[1].prepare_proposal(action.clone()),
            Err(ConsensusError::OutOfTurn(_))
        ));
        assert!(matches!(
            engines[0].prepare_proposal(action),
            Err(ConsensusError::ForeignAction { .. })
        ));
        assert!(engines[1].rounds.is_empty());

        let unsigned = Action::new("hand-1", "p0".into(), ActionKind::Bet, 10);
        assert!(engines[0].prepare_proposal(unsigned).is_err());
    }

    #[test]
    fn test_valid_bet_commits_everywhere() {
        let mut engines = table(3, 100);
        let action = engines[0].sign_action(ActionKind::Bet, 10).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();

        let outcomes = round(&mut engines, &proposal, &"p0".into());
        for (engine, outcome) in engines.iter().zip(&outcomes) {
            assert!(matches!(outcome, RoundOutcome::Committed(c) if c.votes.len() == 3));
            assert_eq!(engine.session().total_pot(), 10);
            assert_eq!(engine.session().current_turn(), 1);
        }
    }

    #[test]
    fn test_reject_reasons() {
        let engines = table(3, 100);
        let root = PlayerId::from("p0");
        let mut action = engines[0].sign_action(ActionKind::Bet, 10).unwrap();
        let good = ProposalMsg::new(action.clone()).unwrap();
        let judge = |e: &Engine, p: &ProposalMsg| {
            let verdict = e.judge(p, &root);
            (verdict.reason, verdict.attributable)
        };

        let nil = ProposalMsg {
            action: None,
            ..good.clone()
        };
        assert_eq!(judge(&engines[1], &nil), ("nil action".to_string(), false));

        let mut stranger = good.clone();
        if let Some(a) = stranger.action.as_mut() {
            a.player = "zed".into();
        }
        assert_eq!(judge(&engines[1], &stranger), ("unknown-player".to_string(), false));

        let mut tampered = good.clone();
        if let Some(a) = tampered.action.as_mut() {
            a.amount = 5;
        }
        assert_eq!(judge(&engines[1], &tampered), ("bad-signature".to_string(), false));

        let relabelled = ProposalMsg {
            proposal_id: ProposalId::from_content(b"elsewhere"),
            ..good.clone()
        };
        assert_eq!(
            judge(&engines[1], &relabelled),
            ("proposal id mismatch".to_string(), false)
        );

        let foreign = engines[1].sign_action(ActionKind::Bet, 10).unwrap();
        let relayed = ProposalMsg::new(foreign).unwrap();
        assert_eq!(judge(&engines[2], &relayed), ("not-root".to_string(), false));

        let too_big = engines[0].sign_action(ActionKind::Bet, 500).unwrap();
        let overdrawn = ProposalMsg::new(too_big).unwrap();
        let (reason, attributable) = judge(&engines[1], &overdrawn);
        assert!(reason.contains("insufficient funds"));
        assert!(attributable);

        action.round_id = "hand-9".to_string();
        action.sign(&engines[0].keypair.secret).unwrap();
        let stale = ProposalMsg::new(action).unwrap();
        let (reason, attributable) = judge(&engines[1], &stale);
        assert!(reason.starts_with("wrong round"));
        assert!(!attributable);

        assert_eq!(judge(&engines[1], &good), ("valid".to_string(), true));
    }

    #[test]
    fn test_nil_proposal_does_not_remove_root() {
        let mut engines = table(3, 100);
        let root = PlayerId::from("p0");
        let nil = ProposalMsg {
            proposal_id: ProposalId::from_content(b"garbage"),
            action: None,
            signature: None,
        };

        // p0 never sent this; only p1 and p2 saw it arrive under p0's name
        let batch: Vec<Vec<u8>> = engines[1..]
            .iter_mut()
            .map(|e| to_wire(&e.receive_proposal(nil.clone(), &root).unwrap()).unwrap())
            .collect();
        for engine in engines[1..].iter_mut() {
            let outcome = engine.receive_votes(batch.clone()).unwrap();
            assert_eq!(
                outcome,
                RoundOutcome::Rejected {
                    proposal_id: nil.proposal_id.clone(),
                    reasons: "nil action".to_string(),
                }
            );
            assert_eq!(engine.session().player_count(), 3);
            assert!(engine.roster().contains(&root));
            assert_eq!(engine.quorum(), 2);
            assert_eq!(engine.next_to_act(), Some(root.clone()));
        }

        // The reject votes cannot be re-used to frame p0 afterwards
        let votes: Vec<VoteMsg> = batch.iter().map(|b| from_wire(b).unwrap()).collect();
        let framed = BanCertificate::new(nil.proposal_id.clone(), root.clone(), votes);
        assert!(matches!(
            engines[1].apply_ban(&framed),
            Err(ConsensusError::MalformedCertificate(_))
        ));
        assert_eq!(engines[1].session().player_count(), 3);
    }

    #[test]
    fn test_overdrawn_bet_bans_proposer() {
        let mut engines = table(3, 100);
        let action = engines[0].sign_action(ActionKind::Bet, 110).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();

        let outcomes = round(&mut engines, &proposal, &"p0".into());
        assert!(matches!(&outcomes[0], RoundOutcome::Expelled(c) if c.accused == PlayerId::from("p0")));
        assert!(engines[0].is_expelled());
        for (engine, outcome) in engines.iter().zip(&outcomes).skip(1) {
            let RoundOutcome::Banned(cert) = outcome else {
                panic!("expected ban, got {outcome:?}");
            };
            assert!(cert.reasons.contains("insufficient funds"));
            assert_eq!(engine.session().player_count(), 2);
            assert_eq!(engine.session().total_pot(), 0);
            assert_eq!(engine.quorum(), 2);
            assert!(!engine.roster().contains(&"p0".into()));
        }

        let next = engines[0].sign_action(ActionKind::Fold, 0).unwrap();
        assert!(matches!(engines[0].prepare_proposal(next), Err(ConsensusError::Expelled)));
    }

    #[test]
    fn test_mixed_and_empty_batches_rejected() {
        let mut engines = table(3, 100);
        let action = engines[0].sign_action(ActionKind::Check, 0).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();
        let root = PlayerId::from("p0");

        let mut batch: Vec<Vec<u8>> = engines
            .iter_mut()
            .map(|e| to_wire(&e.receive_proposal(proposal.clone(), &root).unwrap()).unwrap())
            .collect();
        let stray = VoteMsg::new_signed(
            ProposalId::from_content(b"other"),
            "p2".into(),
            VoteValue::Accept,
            "valid",
            &engines[2].keypair.secret,
        )
        .unwrap();
        batch[2] = to_wire(&stray).unwrap();

        for e in engines.iter_mut() {
            assert!(matches!(
                e.receive_votes(batch.clone()),
                Err(ConsensusError::MixedVoteBatch { .. })
            ));
            assert_eq!(e.session().commit_count(), 0);
        }
        assert!(matches!(
            engines[1].receive_votes(vec![b"garbage".to_vec()]),
            Err(ConsensusError::EmptyVoteBatch)
        ));
    }

    #[test]
    fn test_forged_votes_are_dropped_not_fatal() {
        let mut engines = table(3, 100);
        let action = engines[0].sign_action(ActionKind::Check, 0).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();
        let root = PlayerId::from("p0");

        let mut votes: Vec<VoteMsg> = engines
            .iter_mut()
            .map(|e| e.receive_proposal(proposal.clone(), &root).unwrap())
            .collect();
        // p2's slot carries a vote signed by p1's key
        votes[2].signature = votes[1].signature;
        let batch: Vec<Vec<u8>> = votes.iter().map(|v| to_wire(v).unwrap()).collect();

        // p1 sees only its own and p0's valid accepts: still a quorum of 2
        let outcome = engines[1].receive_votes(batch).unwrap();
        assert!(matches!(outcome, RoundOutcome::Committed(c) if c.votes.len() == 2));
    }

    #[test]
    fn test_quorum_minus_one_is_no_quorum() {
        let mut engines = table(4, 100);
        let action = engines[0].sign_action(ActionKind::Check, 0).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();
        let root = PlayerId::from("p0");

        let v0 = engines[0].receive_proposal(proposal.clone(), &root).unwrap();
        let v1 = engines[1].receive_proposal(proposal, &root).unwrap();
        let outcome = engines[1]
            .receive_votes(vec![to_wire(&v0).unwrap(), to_wire(&v1).unwrap()])
            .unwrap();
        assert_eq!(
            outcome,
            RoundOutcome::NoQuorum {
                proposal_id: v0.proposal_id.clone(),
                accepts: 2,
                rejects: 0,
                quorum: 3,
            }
        );
        assert_eq!(engines[1].session().commit_count(), 0);
    }

    #[test]
    fn test_replayed_proposal_is_rejected() {
        let mut engines = table(3, 100);
        let root = PlayerId::from("p0");
        let check = engines[0].sign_action(ActionKind::Check, 0).unwrap();
        let proposal = engines[0].prepare_proposal(check).unwrap();
        round(&mut engines, &proposal, &root);

        // Everyone checks around back to p0, who replays the first check
        for i in 1..3 {
            let root = PlayerId::new(format!("p{i}"));
            let action = engines[i].sign_action(ActionKind::Check, 0).unwrap();
            let p = engines[i].prepare_proposal(action).unwrap();
            round(&mut engines, &p, &root);
        }
        assert_eq!(engines[1].session().current_turn(), 0);

        // Anyone holding the old bytes could have sent them, so p0 stays
        let outcomes = round(&mut engines, &proposal, &root);
        assert!(matches!(
            &outcomes[1],
            RoundOutcome::Rejected { reasons, .. } if reasons == "duplicate proposal"
        ));
        assert_eq!(engines[1].session().commit_count(), 3);
        assert_eq!(engines[1].session().player_count(), 3);
        assert_eq!(engines[1].next_to_act(), Some(root.clone()));
        assert!(matches!(
            engines[1].decision(&proposal.proposal_id),
            Some(RoundOutcome::Committed(_))
        ));

        // The replay's reject votes cannot be turned against p0 either
        let RoundOutcome::Rejected { .. } = &outcomes[2] else {
            panic!("expected a rejection");
        };
        let votes: Vec<VoteMsg> = engines
            .iter_mut()
            .map(|e| e.receive_proposal(proposal.clone(), &root).unwrap())
            .collect();
        let framed = BanCertificate::new(proposal.proposal_id.clone(), root.clone(), votes);
        assert!(matches!(
            engines[1].apply_ban(&framed),
            Err(ConsensusError::MalformedCertificate(_))
        ));
        assert_eq!(engines[1].session().player_count(), 3);
    }

    #[test]
    fn test_start_hand_forgets_previous_decisions() {
        let mut engines = table(3, 100);
        let root = PlayerId::from("p0");
        let action = engines[0].sign_action(ActionKind::Check, 0).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();
        round(&mut engines, &proposal, &root);
        assert!(engines[1].decision(&proposal.proposal_id).is_some());

        engines[1].start_hand("hand-2").unwrap();
        assert!(engines[1].decision(&proposal.proposal_id).is_none());
        assert!(engines[1].rounds.is_empty());

        // An old-hand replay is refused by the round check and blames nobody
        let verdict = engines[1].judge(&proposal, &root);
        assert!(verdict.reason.starts_with("wrong round"));
        assert!(!verdict.attributable);
    }

    #[test]
    fn test_repeated_certificates_do_not_reapply() {
        let mut engines = table(3, 100);
        let action = engines[0].sign_action(ActionKind::Bet, 10).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();
        let outcomes = round(&mut engines, &proposal, &"p0".into());
        let RoundOutcome::Committed(cert) = &outcomes[1] else {
            panic!("expected commit");
        };

        assert!(matches!(
            engines[1].apply_commit(cert),
            Err(ConsensusError::AlreadyCommitted(_))
        ));
        assert_eq!(engines[1].session().total_pot(), 10);
    }

    #[test]
    fn test_ban_certificate_must_name_the_proposer() {
        let mut engines = table(3, 100);
        let action = engines[0].sign_action(ActionKind::Bet, 110).unwrap();
        let proposal = engines[0].prepare_proposal(action).unwrap();
        let root = PlayerId::from("p0");
        let votes: Vec<VoteMsg> = engines
            .iter_mut()
            .map(|e| e.receive_proposal(proposal.clone(), &root).unwrap())
            .filter(|v| v.value == VoteValue::Reject)
            .collect();

        let framed = BanCertificate::new(proposal.proposal_id.clone(), "p2".into(), votes);
        assert!(matches!(
            engines[1].apply_ban(&framed),
            Err(ConsensusError::MalformedCertificate(_))
        ));
        assert_eq!(engines[1].session().player_count(), 3);
    }
}
