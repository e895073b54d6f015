//! Verification and decryption of sealed scripts.
//!
//! Checks run in a fixed order: envelope structure, then the Ed25519 signature
//! over the ciphertext, then XChaCha20-Poly1305 decryption with the detached
//! tag. Nothing is decrypted unless the signature already verified.

use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{Tag, XNonce};
use ed25519_dalek::Signature;
use thiserror::Error;
use zeroize::Zeroizing;

use super::envelope::{Envelope, EnvelopeError};
use super::keys::KeyMaterial;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UnlockError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeError),
    #[error("signature does not match the trusted key")]
    NotSigned,
    #[error("ciphertext failed authentication")]
    Corrupt,
}

impl UnlockError {
    /// Short label used in load diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            UnlockError::MalformedEnvelope(_) => "malformed envelope",
            UnlockError::NotSigned => "not signed",
            UnlockError::Corrupt => "corrupt",
        }
    }
}

/// Verifies and decrypts `bytes`. The returned plaintext is wiped when
/// dropped; on failure the working buffer is wiped before returning.
pub fn unlock(keys: &KeyMaterial, bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, UnlockError> {
    let envelope = Envelope::split(bytes)?;

    let signature = Signature::from_bytes(envelope.signature);
    keys.verifying_key()
        .verify_strict(envelope.ciphertext, &signature)
        .map_err(|_| UnlockError::NotSigned)?;

    let mut buffer = Zeroizing::new(envelope.ciphertext.to_vec());
    keys.cipher()
        .decrypt_in_place_detached(
            XNonce::from_slice(envelope.nonce),
            b"",
            buffer.as_mut_slice(),
            Tag::from_slice(envelope.mac),
        )
        .map_err(|_| UnlockError::Corrupt)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::{unlock, UnlockError};
    use crate::crypto::envelope::{EnvelopeError, HEADER_LEN, MAC_LEN, NONCE_LEN};
    use crate::crypto::keys::KeyMaterial;
    use crate::crypto::seal::SealingKeys;

    const RFC8032_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const NONCE: [u8; NONCE_LEN] = [9u8; NONCE_LEN];

    fn sealing_keys() -> SealingKeys {
        let seed = hex::decode(RFC8032_SEED).expect("valid hex");
        SealingKeys::from_bytes(&[42u8; 32], &seed).expect("valid keys")
    }

    fn material() -> KeyMaterial {
        sealing_keys().key_material().expect("valid material")
    }

    #[test]
    fn round_trips_script_source() {
        let keys = sealing_keys();
        let sealed = keys
            .seal_with_nonce(b"return { answer = 42 }", &NONCE)
            .expect("sealing should work");
        let plaintext = unlock(&material(), &sealed).expect("unlock should succeed");
        assert_eq!(plaintext.as_slice(), b"return { answer = 42 }");
    }

    #[test]
    fn header_only_envelope_unlocks_to_empty() {
        let sealed = sealing_keys()
            .seal_with_nonce(b"", &NONCE)
            .expect("sealing should work");
        assert_eq!(sealed.len(), HEADER_LEN);
        let plaintext = unlock(&material(), &sealed).expect("empty payload is valid");
        assert!(plaintext.is_empty());
    }

    #[test]
    fn short_buffers_are_malformed() {
        let keys = material();
        for len in 0..HEADER_LEN {
            let err = unlock(&keys, &vec![0u8; len]).unwrap_err();
            assert_eq!(
                err,
                UnlockError::MalformedEnvelope(EnvelopeError::TooShort { len })
            );
        }
    }

    #[test]
    fn any_signature_bit_flip_is_not_signed() {
        let keys = material();
        let sealed = sealing_keys()
            .seal_with_nonce(b"print('hi')", &NONCE)
            .expect("sealing should work");
        let start = NONCE_LEN + MAC_LEN;
        for byte in start..HEADER_LEN {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(unlock(&keys, &tampered).unwrap_err(), UnlockError::NotSigned);
            }
        }
    }

    #[test]
    fn ciphertext_bit_flip_is_rejected() {
        let keys = material();
        let sealed = sealing_keys()
            .seal_with_nonce(b"local x = 1", &NONCE)
            .expect("sealing should work");
        for byte in HEADER_LEN..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(unlock(&keys, &tampered).unwrap_err(), UnlockError::NotSigned);
            }
        }
    }

    #[test]
    fn mac_and_nonce_bit_flips_are_corrupt() {
        let keys = material();
        let sealed = sealing_keys()
            .seal_with_nonce(b"local y = 2", &NONCE)
            .expect("sealing should work");
        for byte in 0..NONCE_LEN + MAC_LEN {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(unlock(&keys, &tampered).unwrap_err(), UnlockError::Corrupt);
            }
        }
    }

    #[test]
    fn foreign_symmetric_key_is_corrupt() {
        let seed = hex::decode(RFC8032_SEED).expect("valid hex");
        let other = SealingKeys::from_bytes(&[1u8; 32], &seed).expect("valid keys");
        let sealed = other
            .seal_with_nonce(b"payload", &NONCE)
            .expect("sealing should work");
        assert_eq!(unlock(&material(), &sealed).unwrap_err(), UnlockError::Corrupt);
    }

    #[test]
    fn foreign_signer_is_not_signed() {
        let other = SealingKeys::from_bytes(&[42u8; 32], &[5u8; 32]).expect("valid keys");
        let sealed = other
            .seal_with_nonce(b"payload", &NONCE)
            .expect("sealing should work");
        assert_eq!(unlock(&material(), &sealed).unwrap_err(), UnlockError::NotSigned);
    }

    #[test]
    fn kinds_are_short_labels() {
        assert_eq!(UnlockError::NotSigned.kind(), "not signed");
        assert_eq!(UnlockError::Corrupt.kind(), "corrupt");
    }
}
