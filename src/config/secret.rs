//! Sensitive configuration values.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Value of a secret field asking for a generated secret.
pub const AUTO_SECRET: &str = "auto";

/// A configuration string that must never reach logs.
///
/// `Debug`, `Display` and `Serialize` all print `[hidden]`; the value is only
/// reachable through [`SecretString::expose`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a random secret (32 bytes from the OS RNG, base64 encoded).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True for the "auto" marker or an empty value.
    pub fn is_auto(&self) -> bool {
        self.0.is_empty() || self.0 == AUTO_SECRET
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([hidden])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[hidden]")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[hidden]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "SecretString([hidden])");
        assert_eq!(secret.to_string(), "[hidden]");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[hidden]\"");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = SecretString::generate();
        let b = SecretString::generate();
        assert_ne!(a, b);
        assert_eq!(STANDARD.decode(a.expose()).unwrap().len(), 32);
        assert!(!a.is_auto());
    }

    #[test]
    fn test_auto_marker() {
        assert!(SecretString::new("auto").is_auto());
        assert!(SecretString::new("").is_auto());
        assert!(!SecretString::new("s3cret").is_auto());
    }
}
