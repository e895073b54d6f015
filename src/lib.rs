//! Loader for signed, encrypted scripts.
//! Sealed files are verified against a baked-in Ed25519 key and decrypted with
//! a baked-in XChaCha20-Poly1305 key before any source reaches the host. Anything
//! that fails a check is skipped and reported, never loaded.

pub mod config;
pub mod crypto;
pub mod loader;
pub mod resolver;
