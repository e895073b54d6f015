//! On-disk storage for a deployment's private keys. The file is JSON; the
//! signing seed and the symmetric key are sealed with a passphrase vault, the
//! public key and salt are stored in the clear.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::seal::{SealError, SealingKeys};
use super::secrets::{decode, EncryptedSecret, SecretVault, SecretVaultError};

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("key file unreadable: {0}")]
    Io(String),
    #[error("key file parse failed: {0}")]
    Parse(String),
    #[error("vault error: {0}")]
    Vault(#[from] SecretVaultError),
    #[error("stored keys are invalid: {0}")]
    InvalidKeys(#[from] SealError),
    #[error("stored public key does not match the signing key")]
    PublicKeyMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyFile {
    pub salt: String,
    pub public_key: String,
    pub signing_key: EncryptedSecret,
    pub symmetric_key: EncryptedSecret,
}

impl KeyFile {
    /// Seals `keys` under a key derived from `passphrase` and a fresh salt.
    pub fn create(keys: &SealingKeys, passphrase: &str) -> Result<Self, KeyFileError> {
        let salt = SecretVault::generate_salt();
        let vault = SecretVault::derive_from_passphrase(passphrase, &salt)?;
        let seed = keys.seed_bytes();

        Ok(Self {
            salt: STANDARD_NO_PAD.encode(salt),
            public_key: STANDARD_NO_PAD.encode(keys.public_key()),
            signing_key: vault.encrypt_secret(seed.as_slice())?,
            symmetric_key: vault.encrypt_secret(keys.symmetric_bytes())?,
        })
    }

    /// Recovers the keys and checks them against the stored public key.
    pub fn unseal(&self, passphrase: &str) -> Result<SealingKeys, KeyFileError> {
        let salt = decode(&self.salt)?;
        let vault = SecretVault::derive_from_passphrase(passphrase, &salt)?;
        let seed = vault.decrypt_secret(&self.signing_key)?;
        let symmetric = vault.decrypt_secret(&self.symmetric_key)?;
        let keys = SealingKeys::from_bytes(&symmetric, &seed)?;

        if decode(&self.public_key)? != keys.public_key() {
            return Err(KeyFileError::PublicKeyMismatch);
        }
        Ok(keys)
    }

    /// Parses a key file from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, KeyFileError> {
        let raw = fs::read_to_string(path).map_err(|e| KeyFileError::Io(format!("{e}")))?;
        serde_json::from_str(&raw).map_err(|e| KeyFileError::Parse(format!("{e}")))
    }

    /// Writes the key file as pretty-printed JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), KeyFileError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| KeyFileError::Parse(format!("{e}")))?;
        fs::write(path, json).map_err(|e| KeyFileError::Io(format!("{e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyFile, KeyFileError};
    use crate::crypto::seal::SealingKeys;
    use crate::crypto::unlock::unlock;
    use tempfile::tempdir;

    #[test]
    fn written_key_file_unseals_to_same_keys() {
        let keys = SealingKeys::generate();
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("deploy.key.json");

        KeyFile::create(&keys, "hunter2")
            .expect("create should work")
            .write(&path)
            .expect("write should work");

        let restored = KeyFile::read(&path)
            .expect("read should work")
            .unseal("hunter2")
            .expect("unseal should work");
        assert_eq!(restored.public_key(), keys.public_key());

        let sealed = restored.seal(b"return true").expect("sealing should work");
        let material = keys.key_material().expect("valid material");
        assert_eq!(
            unlock(&material, &sealed).expect("unlock").as_slice(),
            b"return true"
        );
    }

    #[test]
    fn wrong_passphrase_is_rejected() {
        let keys = SealingKeys::generate();
        let file = KeyFile::create(&keys, "right").expect("create should work");
        let err = file.unseal("wrong").err().expect("must fail");
        assert!(matches!(err, KeyFileError::Vault(_)));
    }

    #[test]
    fn swapped_public_key_is_rejected() {
        let keys = SealingKeys::generate();
        let mut file = KeyFile::create(&keys, "pw").expect("create should work");
        let other = KeyFile::create(&SealingKeys::generate(), "pw").expect("create should work");
        file.public_key = other.public_key;
        let err = file.unseal("pw").err().expect("must fail");
        assert!(matches!(err, KeyFileError::PublicKeyMismatch));
    }

    #[test]
    fn garbage_file_fails_to_parse() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").expect("write");
        let err = KeyFile::read(&path).unwrap_err();
        assert!(format!("{err}").contains("parse failed"));
    }
}
