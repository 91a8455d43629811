//! Signed payload envelope.
//!
//! The signature covers the SHA-256 digest of the padded base64url *text*,
//! not of the raw message. Consensus nodes verify exactly that, so the
//! encoded form must be reproduced byte for byte.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::signing::keys::SigningKeyPair;
use crate::signing::schnorr;

/// Body sent to a consensus node in envelope mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    #[serde(rename = "Payload")]
    pub payload: String,
    #[serde(rename = "Signature")]
    pub signature: String,
}

/// base64url-encode `message` and pad with `=` to a multiple of 4.
pub fn encode_padded(message: &[u8]) -> String {
    URL_SAFE.encode(message)
}

/// Digest that the envelope signature is computed over.
pub fn payload_digest(encoded: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(encoded.as_bytes()));
    out
}

/// Envelope-mode signature of `message`.
pub fn sign_payload(keys: &SigningKeyPair, message: &[u8]) -> SignedPayload {
    let payload = encode_padded(message);
    let signature = schnorr::sign(keys, &payload_digest(&payload));
    SignedPayload {
        payload,
        signature: hex::encode(signature),
    }
}

/// Raw-mode signature of `message`, hex encoded for an `Authorization` header.
pub fn sign_raw(keys: &SigningKeyPair, message: &[u8]) -> String {
    hex::encode(schnorr::sign(keys, message))
}

impl SignedPayload {
    /// Check the envelope against `keys`' public point.
    pub fn verify(&self, keys: &SigningKeyPair) -> bool {
        let Ok(signature) = hex::decode(&self.signature) else {
            return false;
        };
        schnorr::verify(keys.public(), &payload_digest(&self.payload), &signature)
    }
}
