//! Signed literal codec.
//!
//! Wire format: `base64(hmac_sha256(key, payload)) ":" base64(payload)`.
//! The separator is the first `:`; neither base64 part can contain one, so
//! payloads containing `:` round-trip unchanged.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::SecretString;
use crate::crypto::{constant_time_eq, derive_key, CryptoError};

type HmacSha256 = Hmac<Sha256>;

/// JSON member marking a signed literal inside a prop value.
pub const PLN_MARKER: &str = "__pln";

/// Signs and verifies payloads that travel through the client.
pub struct SignedLiteralCodec {
    secret: SecretString,
}

impl SignedLiteralCodec {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// `mac:payload`, both base64.
    pub fn sign(&self, payload: &str) -> String {
        let mac = self.mac(payload.as_bytes());
        format!("{}:{}", mac, STANDARD.encode(payload.as_bytes()))
    }

    /// Recover the payload of a signed literal.
    ///
    /// Missing separator, bad base64, non-UTF-8 payload and MAC mismatch all
    /// return [`CryptoError::VerificationFailure`].
    pub fn verify(&self, signed: &str) -> Result<String, CryptoError> {
        let (mac, encoded) = signed
            .split_once(':')
            .ok_or(CryptoError::VerificationFailure)?;

        let payload = STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::VerificationFailure)?;

        let expected = self.mac(&payload);
        if !constant_time_eq(mac.as_bytes(), expected.as_bytes()) {
            return Err(CryptoError::VerificationFailure);
        }

        String::from_utf8(payload).map_err(|_| CryptoError::VerificationFailure)
    }

    /// `{"__pln": "<signed>"}`, ready to embed in a JSON response.
    pub fn wrap(&self, payload: &str) -> serde_json::Value {
        serde_json::json!({ PLN_MARKER: self.sign(payload) })
    }

    fn mac(&self, payload: &[u8]) -> String {
        let key = derive_key(&self.secret);
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(secret: &str) -> SignedLiteralCodec {
        SignedLiteralCodec::new(SecretString::new(secret))
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let c = codec("test-secret");
        for payload in ["", "hello", "{x: 1, y: \"two\"}", "a:b:c", "ünïcødé ✓", "@2024-01-15"] {
            let signed = c.sign(payload);
            assert_eq!(c.verify(&signed).unwrap(), payload);
        }
    }

    #[test]
    fn test_signed_format() {
        let signed = codec("s").sign("a:b");
        let (mac, encoded) = signed.split_once(':').unwrap();
        assert_eq!(STANDARD.decode(mac).unwrap().len(), 32);
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"a:b");
    }

    #[test]
    fn test_wrong_secret_fails() {
        let signed = codec("one").sign("payload");
        assert_eq!(codec("two").verify(&signed), Err(CryptoError::VerificationFailure));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let c = codec("s");
        let signed = c.sign("{role: \"user\"}");
        let (mac, _) = signed.split_once(':').unwrap();
        let forged = format!("{}:{}", mac, STANDARD.encode("{role: \"admin\"}"));
        assert_eq!(c.verify(&forged), Err(CryptoError::VerificationFailure));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let c = codec("s");
        let signed = c.sign("payload");
        let mut bytes = signed.into_bytes();
        bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(c.verify(&tampered), Err(CryptoError::VerificationFailure));
    }

    #[test]
    fn test_malformed_inputs_fail() {
        let c = codec("s");
        for input in ["", "no-separator", "sig:!!!not-base64!!!", ":"] {
            assert_eq!(c.verify(input), Err(CryptoError::VerificationFailure));
        }
    }

    #[test]
    fn test_wrap() {
        let c = codec("s");
        let wrapped = c.wrap("42");
        let signed = wrapped[PLN_MARKER].as_str().unwrap();
        assert_eq!(c.verify(signed).unwrap(), "42");
    }
}
