use std::collections::BTreeMap;

use fairtable_core::{PlayerId, ProposalId, VoteMsg, VoteValue};
use tracing::debug;

/// Per-proposal vote collector.
///
/// Holds one slot per voter; a later vote from the same voter overwrites the
/// earlier one. The quorum is fixed when the tally is opened.
#[derive(Debug, Clone)]
pub struct VoteTally {
    proposal_id: ProposalId,
    quorum: usize,
    votes: BTreeMap<PlayerId, VoteMsg>,
}

impl VoteTally {
    pub fn new(proposal_id: ProposalId, quorum: usize) -> Self {
        VoteTally {
            proposal_id,
            quorum,
            votes: BTreeMap::new(),
        }
    }

    pub fn proposal_id(&self) -> &ProposalId {
        &self.proposal_id
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Store an already-authenticated vote. Votes for another proposal are ignored.
    pub fn record(&mut self, vote: VoteMsg) -> bool {
        if vote.proposal_id != self.proposal_id {
            return false;
        }
        debug!(
            "Vote {:?} from {} on {}",
            vote.value,
            vote.voter,
            self.proposal_id.short()
        );
        self.votes.insert(vote.voter.clone(), vote);
        true
    }

    fn count(&self, value: VoteValue) -> usize {
        self.votes.values().filter(|v| v.value == value).count()
    }

    pub fn accept_count(&self) -> usize {
        self.count(VoteValue::Accept)
    }

    pub fn reject_count(&self) -> usize {
        self.count(VoteValue::Reject)
    }

    /// Votes with `value`, in voter order
    pub fn votes_with(&self, value: VoteValue) -> Vec<VoteMsg> {
        self.votes.values().filter(|v| v.value == value).cloned().collect()
    }

    /// Accept wins ties, since a commit is checked before a ban
    pub fn decision(&self) -> Option<VoteValue> {
        if self.accept_count() >= self.quorum {
            Some(VoteValue::Accept)
        } else if self.reject_count() >= self.quorum {
            Some(VoteValue::Reject)
        } else {
            None
        }
    }
}
