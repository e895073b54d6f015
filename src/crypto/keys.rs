//! Process-wide key material for unlocking sealed scripts.
//!
//! The symmetric key is never embedded as-is. It is stored as eight 32-bit
//! words in a declared byte order plus a 32-byte mask, and rebuilt by XOR on
//! first use, so the literal key bytes never sit contiguously in the binary.
//! This only raises the bar against casual inspection of the artifact; anyone
//! who can read the constants can rebuild the key. It is obfuscation, not
//! cryptography.

use std::fmt;
use std::sync::OnceLock;

use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305};
use ed25519_dalek::VerifyingKey;
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::embedded;
use super::integrity::short_fingerprint;

pub const SYMMETRIC_KEY_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const KEY_WORDS: usize = SYMMETRIC_KEY_LEN / 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("public key is not a valid Ed25519 point")]
    InvalidPublicKey,
    #[error("invalid key length; expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Byte order used to serialise the obfuscated key words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    Little,
    Big,
}

impl WordOrder {
    /// Byte order of the build target.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            WordOrder::Big
        } else {
            WordOrder::Little
        }
    }

    fn split_word(self, word: u32) -> [u8; 4] {
        match self {
            WordOrder::Little => word.to_le_bytes(),
            WordOrder::Big => word.to_be_bytes(),
        }
    }

    fn join_word(self, bytes: [u8; 4]) -> u32 {
        match self {
            WordOrder::Little => u32::from_le_bytes(bytes),
            WordOrder::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// The obfuscated form of a deployment's keys, as compiled into the binary.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddedConstants {
    pub order: WordOrder,
    pub words: [u32; KEY_WORDS],
    pub mask: [u8; SYMMETRIC_KEY_LEN],
    pub public_key: [u8; PUBLIC_KEY_LEN],
}

impl EmbeddedConstants {
    /// Splits `symmetric` into masked words. Used by the tooling when a new
    /// deployment key is generated.
    pub fn obfuscate(
        order: WordOrder,
        symmetric: &[u8; SYMMETRIC_KEY_LEN],
        mask: [u8; SYMMETRIC_KEY_LEN],
        public_key: [u8; PUBLIC_KEY_LEN],
    ) -> Self {
        let mut words = [0u32; KEY_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            let mut chunk = [0u8; 4];
            for (j, byte) in chunk.iter_mut().enumerate() {
                *byte = symmetric[4 * i + j] ^ mask[4 * i + j];
            }
            *word = order.join_word(chunk);
        }
        Self {
            order,
            words,
            mask,
            public_key,
        }
    }

    fn reconstruct(&self) -> Zeroizing<[u8; SYMMETRIC_KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
        let bytes: &mut [u8; SYMMETRIC_KEY_LEN] = &mut key;
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.words.iter()) {
            chunk.copy_from_slice(&self.order.split_word(*word));
        }
        for (byte, mask) in bytes.iter_mut().zip(self.mask.iter()) {
            *byte ^= mask;
        }
        key
    }

    /// Renders the constants as the source of the `embedded` module.
    pub fn render(&self) -> String {
        let words = self
            .words
            .iter()
            .map(|w| format!("0x{w:08x}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "//! Deployment key constants. Regenerate with `safer keygen`; do not edit by hand.\n\
             \n\
             use super::keys::{{EmbeddedConstants, WordOrder}};\n\
             \n\
             pub(crate) const CONSTANTS: EmbeddedConstants = EmbeddedConstants {{\n    \
             order: WordOrder::{:?},\n    \
             words: [{}],\n    \
             mask: [{}],\n    \
             public_key: [{}],\n\
             }};\n",
            self.order,
            words,
            byte_list(&self.mask),
            byte_list(&self.public_key),
        )
    }
}

fn byte_list(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{b:02x}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Symmetric decryption key plus Ed25519 verification key. Immutable once
/// built; the symmetric key is wiped when the value is dropped and no accessor
/// hands out its bytes.
pub struct KeyMaterial {
    symmetric: Zeroizing<[u8; SYMMETRIC_KEY_LEN]>,
    verifying_key: VerifyingKey,
}

impl KeyMaterial {
    /// Builds material from a raw 32-byte symmetric key and a 32-byte Ed25519
    /// public key. The public key must decode to a curve point.
    pub fn from_parts(symmetric: &[u8], public_key: &[u8]) -> Result<Self, KeyError> {
        let symmetric: &[u8; SYMMETRIC_KEY_LEN] =
            symmetric
                .try_into()
                .map_err(|_| KeyError::InvalidKeyLength {
                    expected: SYMMETRIC_KEY_LEN,
                    actual: symmetric.len(),
                })?;
        let public_key: &[u8; PUBLIC_KEY_LEN] =
            public_key
                .try_into()
                .map_err(|_| KeyError::InvalidKeyLength {
                    expected: PUBLIC_KEY_LEN,
                    actual: public_key.len(),
                })?;
        let verifying_key =
            VerifyingKey::from_bytes(public_key).map_err(|_| KeyError::InvalidPublicKey)?;

        Ok(Self {
            symmetric: Zeroizing::new(*symmetric),
            verifying_key,
        })
    }

    /// Rebuilds the symmetric key from masked words, then validates as
    /// [`KeyMaterial::from_parts`] does.
    pub fn from_obfuscated(constants: &EmbeddedConstants) -> Result<Self, KeyError> {
        let symmetric = constants.reconstruct();
        Self::from_parts(symmetric.as_slice(), &constants.public_key)
    }

    /// Raw bytes of the verification key. Public keys need no secrecy.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.verifying_key.to_bytes()
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub(crate) fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.symmetric.as_slice()))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("symmetric", &"[REDACTED]")
            .field("public_key", &self.verifying_key)
            .finish()
    }
}

static MATERIAL: OnceLock<Result<KeyMaterial, KeyError>> = OnceLock::new();

/// Rebuilds the embedded key material on first call and returns the same
/// instance on every later call, from any thread.
pub fn initialize() -> Result<&'static KeyMaterial, KeyError> {
    MATERIAL
        .get_or_init(|| {
            let material = KeyMaterial::from_obfuscated(&embedded::CONSTANTS);
            match &material {
                Ok(keys) => debug!(
                    public_key = %short_fingerprint(&keys.public_key()),
                    "reconstructed embedded key material"
                ),
                Err(err) => warn!(error = %err, "embedded key material is invalid"),
            }
            material
        })
        .as_ref()
        .map_err(Clone::clone)
}
