use ed25519_dalek::{Signature as DalekSignature, Signer, Verifier};
use std::fmt;

use crate::crypto::impl_hex_serde;
use crate::crypto::keys::{PublicKey, SecretKey};
use crate::error::CoreError;

/// Detached Ed25519 signature (64 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| CoreError::InvalidSignature)?;
        Ok(Signature(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl_hex_serde!(Signature);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &self.to_hex()[..16])
    }
}

/// Sign raw bytes
pub fn sign(secret_key: &SecretKey, message: &[u8]) -> Signature {
    Signature(secret_key.signing_key().sign(message).to_bytes())
}

/// Verify a detached signature over raw bytes
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> Result<(), CoreError> {
    let verifying_key = public_key.verifying_key()?;
    verifying_key
        .verify(message, &DalekSignature::from_bytes(&signature.0))
        .map_err(|_| CoreError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let sig = sign(&kp.secret, b"bet 10");
        assert!(verify(&kp.public, b"bet 10", &sig).is_ok());
    }

    #[test]
    fn test_verify_rejects_other_message() {
        let kp = KeyPair::generate();
        let sig = sign(&kp.secret, b"bet 10");
        assert!(verify(&kp.public, b"bet 11", &sig).is_err());
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let sig = sign(&signer.secret, b"fold");
        assert!(matches!(
            verify(&other.public, b"fold", &sig),
            Err(CoreError::InvalidSignature)
        ));
    }
}
