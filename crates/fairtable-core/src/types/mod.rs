pub mod action;
pub mod card;
pub mod certificate;
pub mod message;
pub mod player;

pub use action::{now_millis, Action, ActionKind};
pub use card::{Card, CardId};
pub use certificate::{join_distinct_reasons, BanCertificate, CommitCertificate};
pub use message::{ProposalId, ProposalMsg, VoteMsg, VoteValue};
pub use player::PlayerId;
