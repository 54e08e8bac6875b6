use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use crate::error::{AppError, Result};

/// The size of the AES-128 key in bytes.
pub const KEY_SIZE: usize = 16;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Fills a fresh buffer with `n` bytes from the operating system RNG.
///
/// # Arguments
///
/// * `n` - The number of bytes to generate.
///
/// # Returns
///
/// A `Result` containing the random bytes.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Crypto(format!("Entropy source failed: {}", e)))?;
    Ok(bytes)
}

fn cipher(key: &[u8]) -> Result<Aes128Gcm> {
    if key.len() != KEY_SIZE {
        return Err(AppError::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_SIZE,
            key.len()
        )));
    }
    Aes128Gcm::new_from_slice(key)
        .map_err(|e| AppError::Crypto(format!("Invalid key: {}", e)))
}

fn check_nonce(nonce: &[u8]) -> Result<()> {
    if nonce.len() != NONCE_SIZE {
        return Err(AppError::Crypto(format!(
            "Invalid nonce length: expected {}, got {}",
            NONCE_SIZE,
            nonce.len()
        )));
    }
    Ok(())
}

/// Encrypts a plaintext using AES-128-GCM without associated data.
///
/// # Arguments
///
/// * `plaintext` - The data to encrypt.
/// * `key` - The 16-byte cipher key.
/// * `nonce` - The 12-byte nonce.
///
/// # Returns
///
/// The ciphertext with the GCM tag appended.
pub fn seal(plaintext: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    check_nonce(nonce)?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| AppError::Crypto(format!("Encryption failed: {}", e)))
}

/// Decrypts a ciphertext using AES-128-GCM.
///
/// Authentication failure is terminal; callers must not retry.
pub fn open(ciphertext: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    check_nonce(nonce)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| AppError::Crypto(format!("Decryption failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_returns_plaintext() {
        let key = random_bytes(KEY_SIZE).unwrap();
        let nonce = random_bytes(NONCE_SIZE).unwrap();

        let sealed = seal(b"attack at dawn", &key, &nonce).unwrap();
        assert_ne!(&sealed[..], b"attack at dawn");
        assert_eq!(open(&sealed, &key, &nonce).unwrap(), b"attack at dawn");
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = random_bytes(KEY_SIZE).unwrap();
        let nonce = random_bytes(NONCE_SIZE).unwrap();

        let mut sealed = seal(b"payload", &key, &nonce).unwrap();
        sealed[0] ^= 0x01;
        assert!(matches!(open(&sealed, &key, &nonce), Err(AppError::Crypto(_))));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let nonce = random_bytes(NONCE_SIZE).unwrap();
        let sealed = seal(b"payload", &[1u8; KEY_SIZE], &nonce).unwrap();
        assert!(open(&sealed, &[2u8; KEY_SIZE], &nonce).is_err());
    }

    #[test]
    fn malformed_key_or_nonce_is_a_crypto_error() {
        let nonce = [0u8; NONCE_SIZE];
        assert!(matches!(seal(b"x", &[0u8; 32], &nonce), Err(AppError::Crypto(_))));
        assert!(matches!(seal(b"x", &[0u8; KEY_SIZE], &[0u8; 8]), Err(AppError::Crypto(_))));
        assert!(matches!(open(b"x", &[0u8; KEY_SIZE], &[0u8; 16]), Err(AppError::Crypto(_))));
    }

    #[test]
    fn random_bytes_has_requested_length() {
        assert_eq!(random_bytes(0).unwrap().len(), 0);
        assert_eq!(random_bytes(37).unwrap().len(), 37);
        assert_ne!(random_bytes(16).unwrap(), random_bytes(16).unwrap());
    }
}
