//! Sealing side of the envelope format, used by the tooling to produce files
//! the loader will accept. The ciphertext is signed after encryption so the
//! loader can reject foreign files before decrypting anything.

use chacha20poly1305::aead::{AeadCore, AeadInPlace, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

use super::envelope::{Envelope, NONCE_LEN};
use super::keys::{
    EmbeddedConstants, KeyError, KeyMaterial, WordOrder, PUBLIC_KEY_LEN, SYMMETRIC_KEY_LEN,
};

const SEED_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("invalid key length; expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// The private half of a deployment: the symmetric key and the Ed25519
/// signing key. Only the tooling ever holds this.
pub struct SealingKeys {
    symmetric: Zeroizing<[u8; SYMMETRIC_KEY_LEN]>,
    signing: SigningKey,
}

impl SealingKeys {
    /// Generates a fresh deployment from the OS RNG.
    pub fn generate() -> Self {
        let mut symmetric = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
        OsRng.fill_bytes(symmetric.as_mut_slice());
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        OsRng.fill_bytes(seed.as_mut_slice());
        Self {
            symmetric,
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Restores keys from a raw symmetric key and a 32-byte Ed25519 seed.
    pub fn from_bytes(symmetric: &[u8], seed: &[u8]) -> Result<Self, SealError> {
        let symmetric: &[u8; SYMMETRIC_KEY_LEN] =
            symmetric
                .try_into()
                .map_err(|_| SealError::InvalidKeyLength {
                    expected: SYMMETRIC_KEY_LEN,
                    actual: symmetric.len(),
                })?;
        let seed: &[u8; SEED_LEN] = seed.try_into().map_err(|_| SealError::InvalidKeyLength {
            expected: SEED_LEN,
            actual: seed.len(),
        })?;
        Ok(Self {
            symmetric: Zeroizing::new(*symmetric),
            signing: SigningKey::from_bytes(seed),
        })
    }

    /// Verification key matching the signing key.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing.verifying_key().to_bytes()
    }

    pub(crate) fn symmetric_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.symmetric
    }

    pub(crate) fn seed_bytes(&self) -> Zeroizing<[u8; SEED_LEN]> {
        Zeroizing::new(self.signing.to_bytes())
    }

    /// Loader-side material matching these keys.
    pub fn key_material(&self) -> Result<KeyMaterial, KeyError> {
        KeyMaterial::from_parts(self.symmetric.as_slice(), &self.public_key())
    }

    /// Obfuscated constants for compiling a loader that trusts these keys.
    pub fn embedded_constants(&self, order: WordOrder) -> EmbeddedConstants {
        let mut mask = [0u8; SYMMETRIC_KEY_LEN];
        OsRng.fill_bytes(&mut mask);
        EmbeddedConstants::obfuscate(order, &self.symmetric, mask, self.public_key())
    }

    /// Seals `plaintext` under a random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let mut bytes = [0u8; NONCE_LEN];
        bytes.copy_from_slice(&nonce);
        self.seal_with_nonce(plaintext, &bytes)
    }

    /// Seals `plaintext` under a caller-chosen nonce. A nonce must never be
    /// reused with the same symmetric key.
    pub fn seal_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<Vec<u8>, SealError> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.symmetric.as_slice()));
        let mut ciphertext = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(XNonce::from_slice(nonce), b"", &mut ciphertext)
            .map_err(|e| SealError::EncryptionFailed(format!("{e}")))?;
        let signature = self.signing.sign(&ciphertext).to_bytes();

        let mut mac = [0u8; 16];
        mac.copy_from_slice(&tag);
        Ok(Envelope {
            nonce,
            mac: &mac,
            signature: &signature,
            ciphertext: &ciphertext,
        }
        .assemble())
    }
}

#[cfg(test)]
mod tests {
    use super::{SealError, SealingKeys};
    use crate::crypto::envelope::{Envelope, HEADER_LEN};
    use crate::crypto::keys::{KeyMaterial, WordOrder};
    use crate::crypto::unlock::unlock;

    #[test]
    fn generated_keys_seal_and_unlock() {
        let keys = SealingKeys::generate();
        let sealed = keys.seal(b"return 1").expect("sealing should work");
        assert_eq!(sealed.len(), HEADER_LEN + 8);
        let material = keys.key_material().expect("valid material");
        let plaintext = unlock(&material, &sealed).expect("unlock should work");
        assert_eq!(plaintext.as_slice(), b"return 1");
    }

    #[test]
    fn random_nonces_differ() {
        let keys = SealingKeys::generate();
        let a = keys.seal(b"same").expect("sealing should work");
        let b = keys.seal(b"same").expect("sealing should work");
        let a = Envelope::split(&a).expect("valid");
        let b = Envelope::split(&b).expect("valid");
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn embedded_constants_rebuild_the_same_keys() {
        let keys = SealingKeys::generate();
        let constants = keys.embedded_constants(WordOrder::native());
        let material = KeyMaterial::from_obfuscated(&constants).expect("valid");
        let sealed = keys.seal(b"obfuscated").expect("sealing should work");
        let plaintext = unlock(&material, &sealed).expect("unlock should work");
        assert_eq!(plaintext.as_slice(), b"obfuscated");
    }

    #[test]
    fn rejects_short_keys() {
        let err = SealingKeys::from_bytes(&[0u8; 31], &[0u8; 32])
            .err()
            .expect("short key must fail");
        assert!(matches!(
            err,
            SealError::InvalidKeyLength {
                expected: 32,
                actual: 31
            }
        ));
    }
}
