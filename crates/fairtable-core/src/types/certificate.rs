use serde::{Deserialize, Serialize};

use crate::types::message::{ProposalId, ProposalMsg, VoteMsg};
use crate::types::player::PlayerId;

/// Evidence that a quorum accepted a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitCertificate {
    pub proposal: ProposalMsg,
    /// Accept votes that justified the commit
    pub votes: Vec<VoteMsg>,
    pub committed: bool,
}

impl CommitCertificate {
    pub fn new(proposal: ProposalMsg, votes: Vec<VoteMsg>) -> Self {
        CommitCertificate {
            proposal,
            votes,
            committed: true,
        }
    }

    pub fn proposal_id(&self) -> &ProposalId {
        &self.proposal.proposal_id
    }
}

/// Evidence that a quorum rejected a proposal from `accused`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanCertificate {
    pub proposal_id: ProposalId,
    pub accused: PlayerId,
    /// Distinct reject reasons, joined. Unsigned narrative only.
    pub reasons: String,
    pub votes: Vec<VoteMsg>,
}

impl BanCertificate {
    pub fn new(proposal_id: ProposalId, accused: PlayerId, votes: Vec<VoteMsg>) -> Self {
        let reasons = join_distinct_reasons(&votes);
        BanCertificate {
            proposal_id,
            accused,
            reasons,
            votes,
        }
    }
}

/// Join reasons in first-seen order, dropping repeats and blanks
pub fn join_distinct_reasons(votes: &[VoteMsg]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for vote in votes {
        let reason = vote.reason.trim();
        if !reason.is_empty() && !seen.contains(&reason) {
            seen.push(reason);
        }
    }
    seen.join("; ")
}
