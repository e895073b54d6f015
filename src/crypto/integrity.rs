//! Fingerprints for identifying keys and sealed files in logs and tool output
//! without printing the material itself.

use sha2::{Digest, Sha256};

/// Produces a raw SHA-256 digest of the provided bytes.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Returns the hexadecimal representation of a SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    sha256_digest(data).iter().map(|b| format!("{:02x}", b)).collect()
}

/// Short form: the first eight bytes of the SHA-256, hex encoded.
pub fn short_fingerprint(data: &[u8]) -> String {
    let mut hex = sha256_hex(data);
    hex.truncate(16);
    hex
}
