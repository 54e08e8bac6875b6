//! Envelope encryption: every payload is sealed under a key derived from a
//! per-entry data key (DEK) and a wrapping key (KEK).
//!
//! The process KEK wraps ephemeral entries, a per-user KEK wraps durable
//! ones. The DEK travels with its ciphertext; only the derived cipher key is
//! secret, and it is wiped as soon as the seal/open call returns.

use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};
use crate::crypto::aes;
use crate::error::{AppError, Result};

/// The size of a per-entry data key in bytes.
pub const DATA_KEY_SIZE: usize = 16;
/// The size of a generated wrapping key in bytes. Only the first 16 feed the derivation.
pub const WRAPPING_KEY_SIZE: usize = 32;

/// Bytes taken from each input by [`derive_key`].
const DERIVATION_INPUT: usize = 16;

/// A key-encryption key held in memory.
pub type WrappingKey = Zeroizing<Vec<u8>>;

/// Overwrites key material with zeros.
///
/// Best-effort: copies made by the allocator or by the caller are not reached.
pub fn wipe(buffer: &mut [u8]) {
    buffer.zeroize();
}

/// The AES key actually used to seal a payload. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherKey([u8; aes::KEY_SIZE]);

impl CipherKey {
    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; aes::KEY_SIZE] {
        &self.0
    }
}

/// Derives the cipher key for a (DEK, KEK) pair.
///
/// `SHA-512(dek[..16] || kek[..16])[..16]`. Unsalted and deterministic.
pub fn derive_key(data_key: &[u8], wrapping_key: &[u8]) -> Result<CipherKey> {
    if data_key.len() < DERIVATION_INPUT || wrapping_key.len() < DERIVATION_INPUT {
        return Err(AppError::Crypto(format!(
            "Key derivation needs {} bytes of each key (got {} and {})",
            DERIVATION_INPUT,
            data_key.len(),
            wrapping_key.len()
        )));
    }

    let mut material = Zeroizing::new([0u8; 2 * DERIVATION_INPUT]);
    material[..DERIVATION_INPUT].copy_from_slice(&data_key[..DERIVATION_INPUT]);
    material[DERIVATION_INPUT..].copy_from_slice(&wrapping_key[..DERIVATION_INPUT]);

    let mut digest = Sha512::digest(&material[..]);
    let mut key = [0u8; aes::KEY_SIZE];
    key.copy_from_slice(&digest[..aes::KEY_SIZE]);
    wipe(digest.as_mut_slice());

    Ok(CipherKey(key))
}

/// Generates a fresh wrapping key.
pub fn generate_wrapping_key() -> Result<WrappingKey> {
    Ok(Zeroizing::new(aes::random_bytes(WRAPPING_KEY_SIZE)?))
}

/// The per-entry half of an envelope: the DEK and the nonce.
#[derive(Clone)]
pub struct EnvelopeKeys {
    /// The data key.
    pub data_key: Zeroizing<Vec<u8>>,
    /// The AES-GCM nonce.
    pub nonce: Vec<u8>,
}

impl EnvelopeKeys {
    /// Draws a random DEK and nonce.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            data_key: Zeroizing::new(aes::random_bytes(DATA_KEY_SIZE)?),
            nonce: aes::random_bytes(aes::NONCE_SIZE)?,
        })
    }

    /// Rebuilds the keys of a stored entry.
    pub fn from_parts(data_key: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self {
            data_key: Zeroizing::new(data_key),
            nonce,
        }
    }

    /// Seals `plaintext` under the key derived from this DEK and `wrapping_key`.
    pub fn seal(&self, plaintext: &[u8], wrapping_key: &[u8]) -> Result<Vec<u8>> {
        let key = derive_key(&self.data_key, wrapping_key)?;
        aes::seal(plaintext, key.as_bytes(), &self.nonce)
    }

    /// Opens `ciphertext` under the key derived from this DEK and `wrapping_key`.
    pub fn open(&self, ciphertext: &[u8], wrapping_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let key = derive_key(&self.data_key, wrapping_key)?;
        aes::open(ciphertext, key.as_bytes(), &self.nonce).map(Zeroizing::new)
    }
}
