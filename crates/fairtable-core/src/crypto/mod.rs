/// Serialize a fixed-size byte newtype as a lowercase hex string so wire
/// messages stay plain JSON.
macro_rules! impl_hex_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                <$ty>::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use impl_hex_serde;

pub mod hash;
pub mod keys;
pub mod signature;

pub use hash::{hash_blake3, sha256_hex, Digest};
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use signature::{sign, verify, Signature};
