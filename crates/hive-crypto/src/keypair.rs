use crate::error::{CodecError, Result};
use ed25519_dalek::{Signer, SigningKey};
use hive_types::PublicKey;
use rand::rngs::OsRng;

/// An ed25519 keypair for signing round payloads
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Create a keypair from a 32-byte seed or a 64-byte `seed || public` secret key
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = match bytes.len() {
            32 | 64 => bytes[..32]
                .try_into()
                .map_err(|_| CodecError::InvalidKey("invalid seed".to_string()))?,
            n => {
                return Err(CodecError::InvalidKey(format!(
                    "expected 32 or 64 key bytes, got {}",
                    n
                )))
            }
        };

        let keypair = Self::from_signing_key(SigningKey::from_bytes(&seed));

        // A 64-byte secret key must embed the public half that the seed derives
        if bytes.len() == 64 && &bytes[32..] != keypair.public_key.as_bytes() {
            return Err(CodecError::InvalidKey(
                "public half does not match seed".to_string(),
            ));
        }

        Ok(keypair)
    }

    /// Decode a base58 secret key (32 or 64 bytes)
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// 64-byte `seed || public` secret key, base58-encoded
    pub fn to_base58(&self) -> String {
        bs58::encode(self.signing_key.to_keypair_bytes()).into_string()
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey::from_bytes(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Detached signature over `message`
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}
