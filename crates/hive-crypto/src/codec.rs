//! Message-recovery signing of round payloads
//!
//! A signed payload is `signature (64 bytes) || canonical JSON bytes`,
//! base58-encoded. Verification returns the embedded bytes, and callers
//! decode those rather than any payload the request body claims.

use crate::error::{CodecError, Result};
use crate::keypair::Keypair;
use ed25519_dalek::{Signature, VerifyingKey};
use hive_types::{canonical_json, AuditSubmission, PublicKey, RoundPayload};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SIGNATURE_LEN: usize = 64;

/// Sign `payload` in canonical form and return the base58 envelope
pub fn sign<T: Serialize>(keypair: &Keypair, payload: &T) -> Result<String> {
    let message = canonical_json::to_canonical_bytes(payload)?;
    let signature = keypair.sign(&message);

    let mut signed = Vec::with_capacity(SIGNATURE_LEN + message.len());
    signed.extend_from_slice(&signature);
    signed.extend_from_slice(&message);
    Ok(bs58::encode(signed).into_string())
}

/// Verify a base58 envelope against `public_key` and recover the signed bytes
pub fn verify(encoded: &str, public_key: &PublicKey) -> Result<Vec<u8>> {
    let signed = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    if signed.len() < SIGNATURE_LEN {
        return Err(CodecError::Decode(format!(
            "signed message too short: {} bytes",
            signed.len()
        )));
    }

    let (sig_bytes, message) = signed.split_at(SIGNATURE_LEN);
    let sig_array: [u8; SIGNATURE_LEN] = sig_bytes
        .try_into()
        .map_err(|_| CodecError::Decode("bad signature length".to_string()))?;
    let signature = Signature::from_bytes(&sig_array);

    let verifying_key =
        VerifyingKey::from_bytes(public_key.as_bytes()).map_err(|_| CodecError::InvalidSignature)?;

    verifying_key.verify_strict(message, &signature).map_err(|_| {
        debug!(signer = %public_key.short(), "Signature rejected");
        CodecError::InvalidSignature
    })?;

    Ok(message.to_vec())
}

/// Verify and decode the recovered bytes as a [`RoundPayload`]
pub fn open_payload(encoded: &str, public_key: &PublicKey) -> Result<RoundPayload> {
    let bytes = verify(encoded, public_key)?;
    RoundPayload::from_slice(&bytes).map_err(|e| CodecError::Payload(e.to_string()))
}

/// A signature envelope together with the key that is claimed to have produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    pub signature: String,
    pub signer_public_key: PublicKey,
}

impl SignedPayload {
    pub fn new<T: Serialize>(keypair: &Keypair, payload: &T) -> Result<Self> {
        Ok(Self {
            signature: sign(keypair, payload)?,
            signer_public_key: *keypair.public_key(),
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    /// Verify against `expected_signer` and decode the embedded payload.
    ///
    /// The envelope's own `signer_public_key` must equal `expected_signer`.
    pub fn open_as(&self, expected_signer: &PublicKey) -> Result<RoundPayload> {
        if self.signer_public_key != *expected_signer {
            return Err(CodecError::InvalidSignature);
        }
        open_payload(&self.signature, expected_signer)
    }

    /// Like [`SignedPayload::open_as`], but the payload must be an `audit` submission
    pub fn open_submission(&self, expected_signer: &PublicKey) -> Result<AuditSubmission> {
        match self.open_as(expected_signer)? {
            RoundPayload::Audit(submission) => Ok(submission),
            other => Err(CodecError::Payload(format!(
                "expected audit submission, got {}",
                other.action()
            ))),
        }
    }
}
