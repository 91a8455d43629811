//! Schnorr signatures over edwards25519.
//!
//! Signature layout is `R ‖ s` (64 bytes) with challenge
//! `h = SHA-512(R ‖ A ‖ m) mod ℓ` and `s = k + h·x`. Nonces are drawn from the
//! OS RNG, so two signatures of the same message differ; both verify.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};

use crate::signing::keys::SigningKeyPair;

/// Signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Sign `message` with the key pair's scalar.
pub fn sign(keys: &SigningKeyPair, message: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut wide = [0u8; 64];
    OsRng.fill_bytes(&mut wide);
    let nonce = Scalar::from_bytes_mod_order_wide(&wide);

    let r = EdwardsPoint::mul_base(&nonce).compress();
    let a = keys.public().compress();
    let challenge = challenge(&r, &a, message);
    let s = nonce + challenge * keys.secret();

    let mut signature = [0u8; SIGNATURE_LEN];
    signature[..32].copy_from_slice(r.as_bytes());
    signature[32..].copy_from_slice(s.as_bytes());
    signature
}

/// Verify `signature` over `message` against `public`.
pub fn verify(public: &EdwardsPoint, message: &[u8], signature: &[u8]) -> bool {
    if signature.len() != SIGNATURE_LEN {
        return false;
    }

    let mut r_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature[..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature[32..]);

    let r = CompressedEdwardsY(r_bytes);
    let Some(r_point) = r.decompress() else {
        return false;
    };
    let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes)) else {
        return false;
    };

    let h = challenge(&r, &public.compress(), message);
    EdwardsPoint::mul_base(&s) == r_point + public * h
}

fn challenge(r: &CompressedEdwardsY, a: &CompressedEdwardsY, message: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(r.as_bytes());
    hasher.update(a.as_bytes());
    hasher.update(message);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}
