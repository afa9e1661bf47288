use fairtable_core::{BanCertificate, CommitCertificate, ProposalId};

/// How a proposal round ended on this node
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// A quorum accepted and the action was applied
    Committed(CommitCertificate),
    /// A quorum rejected and the proposer was removed
    Banned(BanCertificate),
    /// A quorum rejected this node's own proposal
    Expelled(BanCertificate),
    /// A quorum rejected a payload the root never signed; nobody is removed
    Rejected {
        proposal_id: ProposalId,
        reasons: String,
    },
    /// Neither side reached quorum with the votes delivered
    NoQuorum {
        proposal_id: ProposalId,
        accepts: usize,
        rejects: usize,
        quorum: usize,
    },
}

impl RoundOutcome {
    pub fn proposal_id(&self) -> &ProposalId {
        match self {
            RoundOutcome::Committed(cert) => cert.proposal_id(),
            RoundOutcome::Banned(cert) | RoundOutcome::Expelled(cert) => &cert.proposal_id,
            RoundOutcome::Rejected { proposal_id, .. }
            | RoundOutcome::NoQuorum { proposal_id, .. } => proposal_id,
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, RoundOutcome::NoQuorum { .. })
    }
}
