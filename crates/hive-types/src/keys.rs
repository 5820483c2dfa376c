use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::HiveError;

/// Length in bytes of an ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// An opaque 32-byte public key, rendered as base58 on the wire.
///
/// Used for both the staking identity (economic) and the session identity
/// (operational) of a worker node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, HiveError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| HiveError::InvalidKey(format!("{}: {}", s, e)))?;
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            HiveError::InvalidKey(format!("expected {} bytes, got {}", PUBLIC_KEY_LEN, v.len()))
        })?;
        Ok(Self(arr))
    }

    /// Short form for log fields.
    pub fn short(&self) -> String {
        let full = self.to_base58();
        full.chars().take(8).collect()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", self.short())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl FromStr for PublicKey {
    type Err = HiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_base58() {
        let pk = PublicKey::from_bytes([7u8; 32]);
        let encoded = pk.to_base58();
        let decoded = PublicKey::from_base58(&encoded).unwrap();
        assert_eq!(pk, decoded);
        assert_eq!(pk.to_string(), encoded);
    }

    #[test]
    fn test_public_key_wrong_length() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(PublicKey::from_base58(&short).is_err());
        assert!(PublicKey::from_base58("0OIl").is_err());
    }

    #[test]
    fn test_public_key_serde_as_string() {
        let pk = PublicKey::from_bytes([3u8; 32]);
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", pk.to_base58()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }
}
