//! Fairtable Core - identities, signatures, and consensus message types
//!
//! This crate provides the foundational types shared by every peer at a
//! fairtable: signed game actions, proposal and vote envelopes, and the
//! commit/ban certificates that justify a decision.

pub mod crypto;
pub mod error;
pub mod serialize;
pub mod types;

pub use crypto::{hash_blake3, sha256_hex, sign, verify, Digest, KeyPair, PublicKey, SecretKey, Signature};
pub use error::CoreError;
pub use types::*;
