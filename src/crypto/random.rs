//! Random tokens.

use rand::RngCore;

/// `len` random bytes from the OS RNG, hex encoded (2 * len chars).
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
