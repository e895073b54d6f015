//! Fixed-layout envelope for sealed scripts:
//! `nonce (24) | mac (16) | signature (64) | ciphertext (rest)`.
//! Splitting is purely structural; no cryptographic check happens here.

use thiserror::Error;

pub const NONCE_LEN: usize = 24;
pub const MAC_LEN: usize = 16;
pub const SIGNATURE_LEN: usize = 64;
pub const HEADER_LEN: usize = NONCE_LEN + MAC_LEN + SIGNATURE_LEN;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope is {len} bytes, shorter than the {HEADER_LEN}-byte header")]
    TooShort { len: usize },
}

/// Borrowed view over the fields of an envelope buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub nonce: &'a [u8; NONCE_LEN],
    pub mac: &'a [u8; MAC_LEN],
    pub signature: &'a [u8; SIGNATURE_LEN],
    pub ciphertext: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Slices `buffer` at offsets 0, 24, 40 and 104. Buffers shorter than the
    /// header are rejected before any field is read.
    pub fn split(buffer: &'a [u8]) -> Result<Self, EnvelopeError> {
        let too_short = EnvelopeError::TooShort { len: buffer.len() };
        if buffer.len() < HEADER_LEN {
            return Err(too_short);
        }

        let (nonce, rest) = buffer.split_first_chunk::<NONCE_LEN>().ok_or(too_short)?;
        let (mac, rest) = rest.split_first_chunk::<MAC_LEN>().ok_or(too_short)?;
        let (signature, ciphertext) = rest.split_first_chunk::<SIGNATURE_LEN>().ok_or(too_short)?;

        Ok(Self {
            nonce,
            mac,
            signature,
            ciphertext,
        })
    }

    /// Writes the fields back out in wire order.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.extend_from_slice(self.nonce);
        out.extend_from_slice(self.mac);
        out.extend_from_slice(self.signature);
        out.extend_from_slice(self.ciphertext);
        out
    }
}
