//! Fairtable Consensus - agreeing on table actions without a dealer
//!
//! This crate provides quorum arithmetic, vote tallies, certificate
//! verification, the per-node consensus engine and the transport it runs
//! over.

pub mod certificate;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod node;
pub mod outcome;
pub mod quorum;
pub mod roster;
pub mod tally;
pub mod transport;

pub use certificate::{verify_ban_certificate, verify_commit_certificate};
pub use collaborators::{CardDealer, ChopEvaluator, HandEvaluator};
pub use config::ConsensusConfig;
pub use engine::Engine;
pub use error::{ConsensusError, TransportError};
pub use events::NodeEventSink;
pub use node::{Node, NodeStatus};
pub use outcome::RoundOutcome;
pub use quorum::{max_faulty, quorum_for};
pub use roster::Roster;
pub use tally::VoteTally;
pub use transport::{Channel, LocalNetwork, LocalTransport, Mailbox, Sequencer, Transport};
