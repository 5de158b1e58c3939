//! AES-256-GCM sealing and opening of single field values.
//!
//! **Nonces must never repeat under one key.** Every blob carries a fresh
//! random salt, so each derived key is used for exactly one seal; the nonce is
//! still drawn from the OS CSPRNG per call.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use common::NONCE_LEN;
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM encryption or tag verification failed.
    #[error("aead operation failed")]
    AeadFailure,
}

/// Fill a new buffer of `len` bytes from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Draw a fresh 96-bit nonce from the OS CSPRNG.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` with no associated data. Returns ciphertext with the
/// 16-byte tag appended.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
pub fn seal(key: &[u8], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    build_cipher(key)?
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CipherError::AeadFailure)
}

/// Verify and decrypt a sealed payload produced by [`seal`].
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key,
/// tampered data, or a payload shorter than the tag).
pub fn open(key: &[u8], nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
    build_cipher(key)?
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TAG_LEN;

    #[test]
    fn seal_open_round_trip() {
        let key = random_bytes(KEY_LEN);
        let nonce = random_nonce();
        let sealed = seal(&key, &nonce, b"10.0.0.1").unwrap();
        assert_eq!(sealed.len(), 8 + TAG_LEN);
        assert_eq!(open(&key, &nonce, &sealed).unwrap(), b"10.0.0.1");
    }

    #[test]
    fn wrong_key_fails() {
        let nonce = random_nonce();
        let sealed = seal(&random_bytes(KEY_LEN), &nonce, b"secret").unwrap();
        assert_eq!(
            open(&random_bytes(KEY_LEN), &nonce, &sealed),
            Err(CipherError::AeadFailure)
        );
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = random_bytes(KEY_LEN);
        let nonce = random_nonce();
        let mut sealed = seal(&key, &nonce, b"tamper me").unwrap();
        sealed[0] ^= 0xFF;
        assert!(open(&key, &nonce, &sealed).is_err());
    }

    #[test]
    fn payload_shorter_than_tag_fails() {
        let key = random_bytes(KEY_LEN);
        assert!(open(&key, &random_nonce(), &[0u8; TAG_LEN - 1]).is_err());
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert_eq!(
            seal(&[0u8; 16], &random_nonce(), b"x"),
            Err(CipherError::InvalidKeyLength)
        );
    }

    #[test]
    fn random_bytes_are_fresh() {
        assert_eq!(random_bytes(32).len(), 32);
        assert_ne!(random_bytes(32), random_bytes(32));
        assert_ne!(random_nonce(), random_nonce());
    }
}
