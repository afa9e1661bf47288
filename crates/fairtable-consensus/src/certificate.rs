use std::collections::HashSet;

use fairtable_core::{BanCertificate, CommitCertificate, ProposalId, VoteMsg, VoteValue};

use crate::error::ConsensusError;
use crate::roster::Roster;

/// Check that every vote is a valid `value` vote on `proposal_id` from a
/// known member, and that at least `quorum` distinct members signed.
/// A single bad vote fails the whole set.
fn verify_votes(
    votes: &[VoteMsg],
    proposal_id: &ProposalId,
    value: VoteValue,
    roster: &Roster,
    quorum: usize,
) -> Result<(), ConsensusError> {
    if votes.len() < quorum {
        return Err(ConsensusError::InsufficientVotes {
            have: votes.len(),
            need: quorum,
        });
    }

    let mut voters = HashSet::new();
    for vote in votes {
        let invalid = |reason: &str| ConsensusError::InvalidCertificateVote {
            voter: vote.voter.clone(),
            reason: reason.to_string(),
        };

        let key = roster.key_of(&vote.voter).ok_or_else(|| invalid("unknown voter"))?;
        if &vote.proposal_id != proposal_id {
            return Err(invalid("vote is for another proposal"));
        }
        if vote.value != value {
            return Err(invalid("vote has the wrong value"));
        }
        vote.verify(key).map_err(|_| invalid("bad signature"))?;
        voters.insert(&vote.voter);
    }

    if voters.len() < quorum {
        return Err(ConsensusError::InsufficientVotes {
            have: voters.len(),
            need: quorum,
        });
    }
    Ok(())
}

/// Offline re-verification of a commit certificate
pub fn verify_commit_certificate(
    cert: &CommitCertificate,
    roster: &Roster,
    quorum: usize,
) -> Result<(), ConsensusError> {
    if !cert.committed {
        return Err(ConsensusError::MalformedCertificate(
            "certificate is not marked committed".to_string(),
        ));
    }
    let action = cert
        .proposal
        .action
        .as_ref()
        .ok_or_else(|| ConsensusError::MalformedCertificate("nil action".to_string()))?;
    if action.proposal_id()? != cert.proposal.proposal_id {
        return Err(ConsensusError::MalformedCertificate(
            "proposal id does not match action".to_string(),
        ));
    }
    let key = roster
        .key_of(&action.player)
        .ok_or_else(|| ConsensusError::UnknownPlayer(action.player.clone()))?;
    action.verify(key).map_err(|_| {
        ConsensusError::MalformedCertificate("action signature does not verify".to_string())
    })?;

    verify_votes(&cert.votes, cert.proposal_id(), VoteValue::Accept, roster, quorum)
}

/// Offline re-verification of a ban certificate
pub fn verify_ban_certificate(
    cert: &BanCertificate,
    roster: &Roster,
    quorum: usize,
) -> Result<(), ConsensusError> {
    verify_votes(&cert.votes, &cert.proposal_id, VoteValue::Reject, roster, quorum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairtable_core::{Action, ActionKind, KeyPair, PlayerId, ProposalMsg};

    struct Table {
        keys: Vec<KeyPair>,
        roster: Roster,
    }

    fn table(n: usize) -> Table {
        let keys: Vec<KeyPair> = (0..n).map(|i| KeyPair::from_seed(&[i as u8 + 1; 32])).collect();
        let roster = Roster::new(
            keys.iter()
                .enumerate()
                .map(|(i, kp)| (PlayerId::new(format!("p{i}")), kp.public))
                .collect(),
        )
        .unwrap();
        Table { keys, roster }
    }

    fn vote(t: &Table, i: usize, id: &ProposalId, value: VoteValue) -> VoteMsg {
        VoteMsg::new_signed(
            id.clone(),
            PlayerId::new(format!("p{i}")),
            value,
            "insufficient funds",
            &t.keys[i].secret,
        )
        .unwrap()
    }

    fn proposal(t: &Table) -> ProposalMsg {
        let action =
            Action::new_signed("hand-1", "p0".into(), ActionKind::Bet, 10, &t.keys[0].secret).unwrap();
        ProposalMsg::new(action).unwrap()
    }

    #[test]
    fn test_valid_commit_certificate() {
        let t = table(3);
        let p = proposal(&t);
        let votes = vec![
            vote(&t, 1, &p.proposal_id, VoteValue::Accept),
            vote(&t, 2, &p.proposal_id, VoteValue::Accept),
        ];
        let cert = CommitCertificate::new(p, votes);
        verify_commit_certificate(&cert, &t.roster, 2).unwrap();
    }

    #[test]
    fn test_commit_certificate_needs_distinct_voters() {
        let t = table(3);
        let p = proposal(&t);
        let v = vote(&t, 1, &p.proposal_id, VoteValue::Accept);
        let cert = CommitCertificate::new(p, vec![v.clone(), v]);
        assert!(matches!(
            verify_commit_certificate(&cert, &t.roster, 2),
            Err(ConsensusError::InsufficientVotes { have: 1, need: 2 })
        ));
    }

    #[test]
    fn test_commit_certificate_with_tampered_action() {
        let t = table(3);
        let mut p = proposal(&t);
        let votes = vec![
            vote(&t, 1, &p.proposal_id, VoteValue::Accept),
            vote(&t, 2, &p.proposal_id, VoteValue::Accept),
        ];
        if let Some(action) = p.action.as_mut() {
            action.amount = 1;
        }
        let cert = CommitCertificate::new(p, votes);
        assert!(matches!(
            verify_commit_certificate(&cert, &t.roster, 2),
            Err(ConsensusError::MalformedCertificate(_))
        ));
    }

    #[test]
    fn test_ban_certificate_all_or_nothing() {
        let t = table(4);
        let id = ProposalId::from_content(b"bad bet");
        let good: Vec<VoteMsg> = (1..4).map(|i| vote(&t, i, &id, VoteValue::Reject)).collect();
        let cert = BanCertificate::new(id.clone(), "p0".into(), good.clone());
        verify_ban_certificate(&cert, &t.roster, 3).unwrap();

        // One accept smuggled in
        let mut mixed = good.clone();
        mixed[2] = vote(&t, 3, &id, VoteValue::Accept);
        let cert = BanCertificate::new(id.clone(), "p0".into(), mixed);
        assert!(matches!(
            verify_ban_certificate(&cert, &t.roster, 3),
            Err(ConsensusError::InvalidCertificateVote { .. })
        ));

        // One vote on another proposal
        let mut stray = good.clone();
        stray[0] = vote(&t, 1, &ProposalId::from_content(b"other"), VoteValue::Reject);
        let cert = BanCertificate::new(id.clone(), "p0".into(), stray);
        assert!(verify_ban_certificate(&cert, &t.roster, 3).is_err());

        // One forged signature
        let mut forged = good;
        forged[1].signature = vote(&t, 1, &id, VoteValue::Reject).signature;
        let cert = BanCertificate::new(id, "p0".into(), forged);
        assert!(verify_ban_certificate(&cert, &t.roster, 3).is_err());
    }

    #[test]
    fn test_ban_certificate_below_quorum() {
        let t = table(4);
        let id = ProposalId::from_content(b"bad bet");
        let votes = vec![vote(&t, 1, &id, VoteValue::Reject), vote(&t, 2, &id, VoteValue::Reject)];
        let cert = BanCertificate::new(id, "p0".into(), votes);
        assert!(matches!(
            verify_ban_certificate(&cert, &t.roster, 3),
            Err(ConsensusError::InsufficientVotes { have: 2, need: 3 })
        ));
    }
}
