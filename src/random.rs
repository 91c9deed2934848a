//! Cryptographic random byte source.
//!
//! A single entry point over `OsRng`, used everywhere this crate needs fresh
//! salt, IV, or key material.

use rand::{rngs::OsRng, RngCore};

/// Fills `buf` with cryptographically random bytes.
pub fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}
