//! Process key pair loading.
//!
//! # Security
//! - Keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized
//! - The pair is immutable after startup and shared through `Arc`

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Environment variable name for the hex private scalar.
pub const PRIVATE_KEY_ENV_VAR: &str = "GATEWAY_PRIVATE_KEY";
/// Environment variable name for the hex public point.
pub const PUBLIC_KEY_ENV_VAR: &str = "GATEWAY_PUBLIC_KEY";

/// Errors raised while loading key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable {0} not set")]
    MissingEnv(&'static str),

    #[error("Invalid hex in {field}: {reason}")]
    Hex { field: &'static str, reason: String },

    #[error("{field} must be 32 bytes, got {len}")]
    Length { field: &'static str, len: usize },

    #[error("Private key is not a canonical scalar")]
    NonCanonicalScalar,

    #[error("Public key is not a valid edwards25519 point")]
    InvalidPoint,

    #[error("Public key does not match private key")]
    Mismatch,
}

/// The gateway's signing key pair on edwards25519.
#[derive(Clone)]
pub struct SigningKeyPair {
    secret: Scalar,
    public: EdwardsPoint,
}

impl SigningKeyPair {
    /// Build a key pair from the hex encodings of the scalar and the point.
    ///
    /// Both are 32-byte little-endian marshalings, as produced by `keygen`.
    pub fn from_hex(private_hex: &str, public_hex: &str) -> Result<Self, KeyError> {
        let secret_bytes = decode_32("private key", private_hex)?;
        let public_bytes = decode_32("public key", public_hex)?;

        let secret: Scalar = Option::from(Scalar::from_canonical_bytes(secret_bytes))
            .ok_or(KeyError::NonCanonicalScalar)?;
        let public = CompressedEdwardsY(public_bytes)
            .decompress()
            .ok_or(KeyError::InvalidPoint)?;

        if EdwardsPoint::mul_base(&secret) != public {
            return Err(KeyError::Mismatch);
        }

        let pair = Self { secret, public };
        tracing::info!(public_key = %pair.public_hex(), "Signing key pair loaded");
        Ok(pair)
    }

    /// Load the key pair from `GATEWAY_PRIVATE_KEY` / `GATEWAY_PUBLIC_KEY`.
    pub fn from_env() -> Result<Self, KeyError> {
        let private = std::env::var(PRIVATE_KEY_ENV_VAR)
            .map_err(|_| KeyError::MissingEnv(PRIVATE_KEY_ENV_VAR))?;
        let public = std::env::var(PUBLIC_KEY_ENV_VAR)
            .map_err(|_| KeyError::MissingEnv(PUBLIC_KEY_ENV_VAR))?;
        Self::from_hex(private.trim(), public.trim())
    }

    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut wide = [0u8; 64];
        OsRng.fill_bytes(&mut wide);
        let secret = Scalar::from_bytes_mod_order_wide(&wide);
        Self {
            secret,
            public: EdwardsPoint::mul_base(&secret),
        }
    }

    pub(crate) fn secret(&self) -> &Scalar {
        &self.secret
    }

    pub fn public(&self) -> &EdwardsPoint {
        &self.public
    }

    /// Hex of the compressed public point.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public.compress().as_bytes())
    }

    /// Hex of the private scalar. Only the `keygen` command prints this.
    pub fn private_hex(&self) -> String {
        hex::encode(self.secret.as_bytes())
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public", &self.public_hex())
            .finish_non_exhaustive()
    }
}

fn decode_32(field: &'static str, input: &str) -> Result<[u8; 32], KeyError> {
    let bytes = hex::decode(input).map_err(|e| KeyError::Hex {
        field,
        reason: e.to_string(),
    })?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| KeyError::Length { field, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_of_generated_pair() {
        let pair = SigningKeyPair::generate();
        let loaded = SigningKeyPair::from_hex(&pair.private_hex(), &pair.public_hex()).unwrap();
        assert_eq!(loaded.public_hex(), pair.public_hex());
    }

    #[test]
    fn test_mismatched_public_key_is_rejected() {
        let a = SigningKeyPair::generate();
        let b = SigningKeyPair::generate();
        let err = SigningKeyPair::from_hex(&a.private_hex(), &b.public_hex()).unwrap_err();
        assert!(matches!(err, KeyError::Mismatch));
    }

    #[test]
    fn test_bad_lengths_and_hex() {
        let pair = SigningKeyPair::generate();
        assert!(matches!(
            SigningKeyPair::from_hex("abcd", &pair.public_hex()).unwrap_err(),
            KeyError::Length { len: 2, .. }
        ));
        assert!(matches!(
            SigningKeyPair::from_hex("zz", &pair.public_hex()).unwrap_err(),
            KeyError::Hex { .. }
        ));
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let pair = SigningKeyPair::generate();
        let debug = format!("{:?}", pair);
        assert!(!debug.contains(&pair.private_hex()));
        assert!(debug.contains(&pair.public_hex()));
    }
}
