//! Key derivation from the configured secret.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::config::SecretString;

/// Length of derived key material in bytes.
pub const KEY_LEN: usize = 32;

/// Symmetric key material derived from a [`SecretString`].
///
/// Recomputed for every operation; never stored or printed.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([hidden])")
    }
}

/// SHA-256 of the secret's UTF-8 bytes.
pub fn derive_key(secret: &SecretString) -> DerivedKey {
    let digest = Sha256::digest(secret.expose().as_bytes());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest);
    DerivedKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_is_deterministic() {
        let a = derive_key(&SecretString::new("test-secret"));
        let b = derive_key(&SecretString::new("test-secret"));
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), KEY_LEN);
    }

    #[test]
    fn test_different_secrets_give_different_keys() {
        let a = derive_key(&SecretString::new("secret-one"));
        let b = derive_key(&SecretString::new("secret-two"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_vector() {
        // sha256("abc")
        let key = derive_key(&SecretString::new("abc"));
        assert_eq!(
            hex::encode(key.as_bytes()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = derive_key(&SecretString::new("abc"));
        assert_eq!(format!("{:?}", key), "DerivedKey([hidden])");
    }
}
