//! Secret-at-rest encryption.
//!
//! Built on `aes-gcm`'s AES-256-GCM AEAD: a random 96-bit nonce, the secret
//! key version folded into the associated data (so a ciphertext sealed
//! under one key version fails to authenticate under another), and the
//! crate's own tag rather than a hand-rolled one.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{StorageError, StorageResult};

const NONCE_LEN: usize = 12;

/// A 32-byte key used to encrypt and decrypt secret values at rest.
///
/// Zeroized on drop; never `Debug`-printed with its contents visible.
#[derive(Clone)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Wrap raw key bytes (e.g. `relay_config::EncryptionKey::as_bytes()`).
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new_from_slice(&self.0).expect("key is exactly 32 bytes")
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Ciphertext plus the nonce and key version it was produced under.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    /// Encrypted bytes, including the AEAD tag appended by `aes-gcm`.
    pub bytes: Vec<u8>,
    /// Nonce used to seal this ciphertext.
    pub nonce: [u8; NONCE_LEN],
    /// Key version this ciphertext was encrypted under.
    pub key_version: u32,
}

/// Encrypt `plaintext` under `key`, tagging the ciphertext with `key_version`
/// so a later decrypt with a different version fails loudly.
#[must_use]
pub fn encrypt(key: &SecretKey, key_version: u32, plaintext: &[u8]) -> Ciphertext {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let bytes = key
        .cipher()
        .encrypt(nonce, Payload { msg: plaintext, aad: &key_version.to_le_bytes() })
        .expect("AES-256-GCM encryption under a fixed-size key/nonce cannot fail");
    Ciphertext { bytes, nonce: nonce_bytes, key_version }
}

/// The serialized form written to [`crate::models::SecretRow`]: ciphertext
/// (tag included) and nonce, each base64-encoded.
#[must_use]
pub fn seal(key: &SecretKey, key_version: u32, plaintext: &[u8]) -> (String, String) {
    use base64::Engine as _;
    let ct = encrypt(key, key_version, plaintext);
    let b64 = base64::engine::general_purpose::STANDARD;
    (b64.encode(ct.bytes), b64.encode(ct.nonce))
}

/// Reverse [`seal`]. Fails if the tag doesn't match (wrong key, wrong key
/// version, or corrupted ciphertext).
///
/// # Errors
///
/// Returns [`StorageError::DecryptionFailed`] on any authentication or
/// decoding failure.
pub fn unseal(key: &SecretKey, key_version: u32, ciphertext_b64: &str, nonce_b64: &str) -> StorageResult<Vec<u8>> {
    use base64::Engine as _;
    let b64 = base64::engine::general_purpose::STANDARD;
    let sealed = b64
        .decode(ciphertext_b64)
        .map_err(|e| StorageError::DecryptionFailed(e.to_string()))?;
    let nonce_vec = b64
        .decode(nonce_b64)
        .map_err(|e| StorageError::DecryptionFailed(e.to_string()))?;
    let nonce_bytes: [u8; NONCE_LEN] = nonce_vec
        .try_into()
        .map_err(|_| StorageError::DecryptionFailed("bad nonce length".into()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    key.cipher()
        .decrypt(nonce, Payload { msg: &sealed, aad: &key_version.to_le_bytes() })
        .map_err(|_| {
            StorageError::DecryptionFailed(
                "authentication failed: wrong key, wrong key version, or corrupted ciphertext".into(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = SecretKey::from_bytes([7u8; 32]);
        let (ciphertext, nonce) = seal(&key, 1, b"super-secret-value");
        let plaintext = unseal(&key, 1, &ciphertext, &nonce).unwrap();
        assert_eq!(plaintext, b"super-secret-value");
    }

    #[test]
    fn wrong_key_version_fails() {
        let key = SecretKey::from_bytes([7u8; 32]);
        let (ciphertext, nonce) = seal(&key, 1, b"value");
        let result = unseal(&key, 2, &ciphertext, &nonce);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let key_a = SecretKey::from_bytes([1u8; 32]);
        let key_b = SecretKey::from_bytes([2u8; 32]);
        let (ciphertext, nonce) = seal(&key_a, 1, b"value");
        let result = unseal(&key_b, 1, &ciphertext, &nonce);
        assert!(result.is_err());
    }
}
