use std::time::Duration;

use fairtable_core::{PlayerId, ProposalId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Unknown member: {0}")]
    UnknownMember(PlayerId),

    #[error("Send to {to} failed: {reason}")]
    Send { to: PlayerId, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Sequence {seq} is too far ahead of {consumed}")]
    OutOfWindow { seq: u64, consumed: u64 },
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Player not in session: {0}")]
    PlayerNotInSession(PlayerId),

    #[error("Cannot propose out-of-turn: {0}")]
    OutOfTurn(PlayerId),

    #[error("Action by {action} cannot be proposed by local player {local}")]
    ForeignAction { action: PlayerId, local: PlayerId },

    #[error("Local player holds the turn and must propose")]
    OwnTurn,

    #[error("Node has been expelled from the table")]
    Expelled,

    #[error("Vote batch is empty")]
    EmptyVoteBatch,

    #[error("Vote batch mixes proposals: expected {expected}, found {found}")]
    MixedVoteBatch { expected: ProposalId, found: ProposalId },

    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    #[error("Proposal already committed: {0}")]
    AlreadyCommitted(ProposalId),

    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("Insufficient votes: have {have}, need {need}")]
    InsufficientVotes { have: usize, need: usize },

    #[error("Invalid vote from {voter} in certificate: {reason}")]
    InvalidCertificateVote { voter: PlayerId, reason: String },

    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("Roster does not match session: {0}")]
    RosterMismatch(String),

    #[error("Round timed out after {0:?}")]
    RoundTimeout(Duration),

    #[error("Dealing failed: {0}")]
    Dealing(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("State error: {0}")]
    State(#[from] fairtable_state::StateError),

    #[error("Core error: {0}")]
    Core(#[from] fairtable_core::CoreError),
}
