//! Shared cryptographic primitives.
//!
//! # Responsibilities
//! - Derive fixed-size key material from the configured secret
//! - Constant-time comparison of tokens and MACs
//! - Random token generation
//! - One error vocabulary for every codec built on top
//!
//! # Design Decisions
//! - Symmetric primitives only (AES-256-GCM, HMAC-SHA256)
//! - Decode/verify failures carry no detail: malformed input, a wrong
//!   secret and tampered ciphertext all look the same to callers

pub mod keys;
pub mod random;

use subtle::ConstantTimeEq;
use thiserror::Error;

pub use keys::{derive_key, DerivedKey, KEY_LEN};
pub use random::random_hex;

/// Errors produced by the session and signed-literal codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Ciphertext could not be decoded, authenticated or parsed.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Signed literal could not be decoded or its MAC did not match.
    #[error("verification failed")]
    VerificationFailure,

    /// Plaintext could not be serialized or sealed.
    #[error("encryption failed")]
    EncryptionFailure,
}

/// Constant-time byte comparison. Lengths are compared first.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
