use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{sha256_hex, sign, verify, PublicKey, SecretKey, Signature};
use crate::error::CoreError;
use crate::serialize;
use crate::types::action::Action;
use crate::types::player::PlayerId;

/// Hex SHA-256 of an action's canonical bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    pub fn from_content(canonical_bytes: &[u8]) -> Self {
        ProposalId(sha256_hex(canonical_bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A candidate action put to the table.
///
/// `action` is optional on the wire: a peer may relay a proposal with the
/// action missing, which voters reject rather than fail to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalMsg {
    pub proposal_id: ProposalId,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub signature: Option<Signature>,
}

impl ProposalMsg {
    /// Wrap a signed action, deriving its content id
    pub fn new(action: Action) -> Result<Self, CoreError> {
        let signature = action.signature.ok_or(CoreError::Unsigned)?;
        Ok(ProposalMsg {
            proposal_id: action.proposal_id()?,
            action: Some(action),
            signature: Some(signature),
        })
    }

    pub fn proposer(&self) -> Option<&PlayerId> {
        self.action.as_ref().map(|a| &a.player)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteValue {
    Accept,
    Reject,
}

/// One member's signed judgement on a proposal.
///
/// Only `(proposal_id, voter, value)` is signed. `reason` is advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteMsg {
    pub proposal_id: ProposalId,
    pub voter: PlayerId,
    pub value: VoteValue,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub signature: Option<Signature>,
}

#[derive(Serialize)]
struct VoteSigningData<'a> {
    proposal_id: &'a ProposalId,
    voter: &'a PlayerId,
    value: VoteValue,
}

impl VoteMsg {
    pub fn new_signed(
        proposal_id: ProposalId,
        voter: PlayerId,
        value: VoteValue,
        reason: impl Into<String>,
        secret_key: &SecretKey,
    ) -> Result<Self, CoreError> {
        let mut vote = VoteMsg {
            proposal_id,
            voter,
            value,
            reason: reason.into(),
            signature: None,
        };
        let bytes = vote.signing_bytes()?;
        vote.signature = Some(sign(secret_key, &bytes));
        Ok(vote)
    }

    pub fn signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serialize::to_canonical_bytes(&VoteSigningData {
            proposal_id: &self.proposal_id,
            voter: &self.voter,
            value: self.value,
        })
    }

    pub fn verify(&self, public_key: &PublicKey) -> Result<(), CoreError> {
        let signature = self.signature.as_ref().ok_or(CoreError::Unsigned)?;
        verify(public_key, &self.signing_bytes()?, signature)
    }

    pub fn is_accept(&self) -> bool {
        self.value == VoteValue::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::action::ActionKind;

    #[test]
    fn test_proposal_carries_action_signature() {
        let kp = KeyPair::generate();
        let action = Action::new_signed("hand-1", "alice".into(), ActionKind::Bet, 10, &kp.secret)
            .unwrap();
        let proposal = ProposalMsg::new(action.clone()).unwrap();
        assert_eq!(proposal.proposal_id, action.proposal_id().unwrap());
        assert_eq!(proposal.signature, action.signature);
        assert_eq!(proposal.proposer(), Some(&PlayerId::from("alice")));
    }

    #[test]
    fn test_unsigned_action_cannot_be_proposed() {
        let action = Action::new("hand-1", "alice".into(), ActionKind::Bet, 10);
        assert!(matches!(ProposalMsg::new(action), Err(CoreError::Unsigned)));
    }

    #[test]
    fn test_proposal_with_null_action_decodes() {
        let json = r#"{"proposal_id":"00","action":null}"#;
        let proposal: ProposalMsg = serialize::from_wire(json.as_bytes()).unwrap();
        assert!(proposal.action.is_none());
    }

    #[test]
    fn test_vote_reason_is_not_signed() {
        let kp = KeyPair::generate();
        let mut vote = VoteMsg::new_signed(
            ProposalId::from_content(b"x"),
            "bob".into(),
            VoteValue::Reject,
            "insufficient funds",
            &kp.secret,
        )
        .unwrap();
        vote.reason = "something else".to_string();
        assert!(vote.verify(&kp.public).is_ok());

        vote.value = VoteValue::Accept;
        assert!(vote.verify(&kp.public).is_err());
    }
}
