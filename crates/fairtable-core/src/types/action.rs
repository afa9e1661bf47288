use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::{sign, verify, PublicKey, SecretKey, Signature};
use crate::error::CoreError;
use crate::serialize;
use crate::types::message::ProposalId;
use crate::types::player::PlayerId;

/// Kinds of move a player can put to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Bet,
    Call,
    Raise,
    Fold,
    Check,
    AllIn,
    Showdown,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Bet => "bet",
            ActionKind::Call => "call",
            ActionKind::Raise => "raise",
            ActionKind::Fold => "fold",
            ActionKind::Check => "check",
            ActionKind::AllIn => "all-in",
            ActionKind::Showdown => "showdown",
        };
        f.write_str(name)
    }
}

/// A player's signed intent for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Round the action belongs to
    pub round_id: String,
    /// Acting player
    pub player: PlayerId,
    pub kind: ActionKind,
    /// Chips put in by Bet / Raise, or the declared total for AllIn
    pub amount: u64,
    /// Unix milliseconds, stamped at signing
    pub timestamp: u64,
    /// Detached signature over every other field
    #[serde(default)]
    pub signature: Option<Signature>,
}

/// Field-ordered view of an action without its signature
#[derive(Serialize)]
struct ActionSigningData<'a> {
    round_id: &'a str,
    player: &'a PlayerId,
    kind: ActionKind,
    amount: u64,
    timestamp: u64,
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl Action {
    /// Create a new unsigned action
    pub fn new(round_id: impl Into<String>, player: PlayerId, kind: ActionKind, amount: u64) -> Self {
        Action {
            round_id: round_id.into(),
            player,
            kind,
            amount,
            timestamp: 0,
            signature: None,
        }
    }

    fn signing_data(&self) -> ActionSigningData<'_> {
        ActionSigningData {
            round_id: &self.round_id,
            player: &self.player,
            kind: self.kind,
            amount: self.amount,
            timestamp: self.timestamp,
        }
    }

    /// Canonical bytes covered by the signature and the proposal id
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serialize::to_canonical_bytes(&self.signing_data())
    }

    /// Stamp a fresh timestamp and sign. Re-signing changes the proposal id.
    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<(), CoreError> {
        self.timestamp = now_millis();
        self.sign_at(secret_key, self.timestamp)
    }

    /// Sign with a caller-chosen timestamp
    pub fn sign_at(&mut self, secret_key: &SecretKey, timestamp: u64) -> Result<(), CoreError> {
        self.timestamp = timestamp;
        let bytes = self.signing_bytes()?;
        self.signature = Some(sign(secret_key, &bytes));
        Ok(())
    }

    pub fn new_signed(
        round_id: impl Into<String>,
        player: PlayerId,
        kind: ActionKind,
        amount: u64,
        secret_key: &SecretKey,
    ) -> Result<Self, CoreError> {
        let mut action = Self::new(round_id, player, kind, amount);
        action.sign(secret_key)?;
        Ok(action)
    }

    /// Verify against the claimed player's key
    pub fn verify(&self, public_key: &PublicKey) -> Result<(), CoreError> {
        let signature = self.signature.as_ref().ok_or(CoreError::Unsigned)?;
        let bytes = self.signing_bytes()?;
        verify(public_key, &bytes, signature)
    }

    pub fn is_signed_by(&self, public_key: &PublicKey) -> bool {
        self.verify(public_key).is_ok()
    }

    /// Content address: hex SHA-256 of the canonical signing bytes
    pub fn proposal_id(&self) -> Result<ProposalId, CoreError> {
        Ok(ProposalId::from_content(&self.signing_bytes()?))
    }
}
