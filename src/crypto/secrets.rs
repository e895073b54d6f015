//! Passphrase vault for the private deployment keys kept by the tooling.
//! A ChaCha20-Poly1305 key is derived from the passphrase with Argon2id and
//! each secret is stored as base64 nonce, ciphertext and tag.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use chacha20poly1305::aead::{AeadCore, AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 16;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const DERIVED_KEY_LEN: usize = 32;

/// Argon2id cost: 19 MiB, 3 passes, single lane.
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 3;
const PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub enum SecretVaultError {
    #[error("argon2 derivation failed: {0}")]
    DerivationFailed(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: wrong passphrase or tampered secret")]
    DecryptionFailed,
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
    #[error("{field} length mismatch")]
    LengthMismatch { field: &'static str },
}

/// A vault-sealed value; each field is unpadded base64.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedSecret {
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

/// Holds a passphrase-derived key used to seal tool-side secrets.
pub struct SecretVault {
    key: Zeroizing<[u8; DERIVED_KEY_LEN]>,
}

impl SecretVault {
    /// Random salt for a new key file.
    pub fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Derives the vault key from `passphrase` and `salt` with Argon2id.
    pub fn derive_from_passphrase(passphrase: &str, salt: &[u8]) -> Result<Self, SecretVaultError> {
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(DERIVED_KEY_LEN))
            .map_err(|e| SecretVaultError::DerivationFailed(format!("{e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, key.as_mut_slice())
            .map_err(|e| SecretVaultError::DerivationFailed(format!("{e}")))?;
        Ok(Self { key })
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.key.as_slice()))
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    pub fn encrypt_secret(&self, plaintext: &[u8]) -> Result<EncryptedSecret, SecretVaultError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let mut buffer = Zeroizing::new(plaintext.to_vec());
        let tag = self
            .cipher()
            .encrypt_in_place_detached(&nonce, b"", buffer.as_mut_slice())
            .map_err(|e| SecretVaultError::EncryptionFailed(format!("{e}")))?;

        Ok(EncryptedSecret {
            nonce: STANDARD_NO_PAD.encode(nonce),
            ciphertext: STANDARD_NO_PAD.encode(buffer.as_slice()),
            tag: STANDARD_NO_PAD.encode(tag),
        })
    }

    /// Decrypts a secret; fails on a wrong passphrase or any tampering.
    pub fn decrypt_secret(
        &self,
        secret: &EncryptedSecret,
    ) -> Result<Zeroizing<Vec<u8>>, SecretVaultError> {
        let nonce = decode(&secret.nonce)?;
        let tag = decode(&secret.tag)?;
        if nonce.len() != NONCE_SIZE {
            return Err(SecretVaultError::LengthMismatch { field: "nonce" });
        }
        if tag.len() != TAG_SIZE {
            return Err(SecretVaultError::LengthMismatch { field: "tag" });
        }

        let mut buffer = Zeroizing::new(decode(&secret.ciphertext)?);
        self.cipher()
            .decrypt_in_place_detached(
                Nonce::from_slice(&nonce),
                b"",
                buffer.as_mut_slice(),
                Tag::from_slice(&tag),
            )
            .map_err(|_| SecretVaultError::DecryptionFailed)?;
        Ok(buffer)
    }
}

pub(crate) fn decode(field: &str) -> Result<Vec<u8>, SecretVaultError> {
    STANDARD_NO_PAD
        .decode(field.as_bytes())
        .map_err(|e| SecretVaultError::Base64DecodeFailed(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::{EncryptedSecret, SecretVault, SecretVaultError};
    use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};

    const SALT: &[u8] = b"static-test-salt";

    #[test]
    fn derives_and_round_trips() {
        let vault = SecretVault::derive_from_passphrase("pa55phrase", SALT)
            .expect("derivation should succeed");
        let encrypted = vault
            .encrypt_secret(b"signing-seed")
            .expect("encryption should work");
        let decrypted = vault
            .decrypt_secret(&encrypted)
            .expect("decryption should work");
        assert_eq!(decrypted.as_slice(), b"signing-seed");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let vault = SecretVault::derive_from_passphrase("right", SALT).expect("valid");
        let encrypted = vault.encrypt_secret(b"secret").expect("encryption should work");
        let other = SecretVault::derive_from_passphrase("wrong", SALT).expect("valid");
        let err = other.decrypt_secret(&encrypted).unwrap_err();
        assert!(matches!(err, SecretVaultError::DecryptionFailed));
    }

    #[test]
    fn rejects_wrong_nonce_length() {
        let vault = SecretVault::derive_from_passphrase("pa55phrase", SALT).expect("valid");
        let bogus = EncryptedSecret {
            nonce: STANDARD_NO_PAD.encode([0u8; 24]),
            ciphertext: STANDARD_NO_PAD.encode([0u8; 5]),
            tag: STANDARD_NO_PAD.encode([0u8; 16]),
        };
        let err = vault.decrypt_secret(&bogus).unwrap_err();
        assert!(format!("{err}").contains("nonce length mismatch"));
    }
}
