//! Authenticated encryption of session payloads.
//!
//! Wire format: `base64(nonce[12] ‖ ciphertext ‖ tag[16])`, AES-256-GCM,
//! key derived from the session secret.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

use crate::config::SecretString;
use crate::crypto::{derive_key, CryptoError};
use crate::session::data::SessionData;

/// AES-GCM nonce size in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const TAG_LEN: usize = 16;

/// Serialize and encrypt a session. Every call uses a fresh random nonce.
pub fn encrypt_session(data: &SessionData, secret: &SecretString) -> Result<String, CryptoError> {
    let plaintext = serde_json::to_vec(data).map_err(|_| CryptoError::EncryptionFailure)?;

    let key = derive_key(secret);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| CryptoError::EncryptionFailure)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(STANDARD.encode(out))
}

/// Decode, authenticate and deserialize a session token.
///
/// Every failure is [`CryptoError::AuthenticationFailure`].
pub fn decrypt_session(token: &str, secret: &SecretString) -> Result<SessionData, CryptoError> {
    let raw = STANDARD
        .decode(token)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    if raw.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AuthenticationFailure);
    }

    let key = derive_key(secret);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let (nonce, sealed) = raw.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    serde_json::from_slice(&plaintext).map_err(|_| CryptoError::AuthenticationFailure)
}
