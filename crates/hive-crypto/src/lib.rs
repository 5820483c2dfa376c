//! Signing and verification of hive round payloads.
//!
//! Workers sign every round-scoped request with their staking key. The
//! coordinator only trusts fields it recovers from a verified signature.

pub mod codec;
pub mod error;
pub mod keypair;

pub use codec::{open_payload, sign, verify, SignedPayload, SIGNATURE_LEN};
pub use error::{CodecError, Result};
pub use keypair::Keypair;
