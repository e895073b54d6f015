//! Cryptography for sealed scripts. Each submodule owns one step: envelope
//! layout, key material, verification and decryption, the sealing side used by
//! the tooling, and passphrase-protected key files.

pub(crate) mod embedded;
pub mod envelope;
pub mod integrity;
pub mod keyfile;
pub mod keys;
pub mod seal;
pub mod secrets;
pub mod unlock;
