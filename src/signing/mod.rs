//! Request signing subsystem.
//!
//! # Data Flow
//! ```text
//! Environment (GATEWAY_PRIVATE_KEY, GATEWAY_PUBLIC_KEY)
//!     → keys.rs (load once, verify pair)
//!     → schnorr.rs (R ‖ s over edwards25519)
//!     → payload.rs (envelope mode: padded base64url + SHA-256 digest,
//!                   raw mode: hex signature for the Authorization header)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys
//! - The pair is read-only after startup; no locking needed

pub mod keys;
pub mod payload;
pub mod schnorr;

use std::sync::Arc;

pub use keys::{KeyError, SigningKeyPair};
pub use payload::SignedPayload;

/// Shared signer handed to request handlers.
#[derive(Clone, Debug)]
pub struct RequestSigner {
    keys: Arc<SigningKeyPair>,
}

impl RequestSigner {
    pub fn new(keys: SigningKeyPair) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    /// Envelope mode.
    pub fn sign(&self, message: &[u8]) -> SignedPayload {
        payload::sign_payload(&self.keys, message)
    }

    /// Raw mode: hex signature over `message` itself.
    pub fn sign_raw(&self, message: &[u8]) -> String {
        payload::sign_raw(&self.keys, message)
    }

    pub fn keys(&self) -> &SigningKeyPair {
        &self.keys
    }
}
