//! Passphrase-based key stretching.
//!
//! V1/V2: `key = SHA1(passphrase || salt)`, used directly.
//! V3: the documented Password Safe key-stretch algorithm — iterated
//! SHA-256 hashed into a fixed buffer rather than reallocated each round.

use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::secret_array::SecretArray;

/// `SHA1(passphrase || salt)`, the V1/V2 record-layer key.
pub fn stretch_v1v2(passphrase: &[u8], salt: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(passphrase);
    hasher.update(salt);
    hasher.finalize().into()
}

/// The V3 stretched-key derivation.
///
/// Holds the password already hashed once so that deriving against many
/// candidate salts (as tests do) doesn't re-hash the passphrase bytes
/// repeatedly.
pub struct V3Stretch {
    prepared_password: Sha256,
}

impl V3Stretch {
    pub fn new(passphrase: &[u8]) -> Self {
        let mut prepared_password = Sha256::new();
        prepared_password.update(passphrase);
        V3Stretch { prepared_password }
    }

    /// Computes `P = SHA256(passphrase || salt)`, then iterates
    /// `P = SHA256(P)` for `iter` rounds.
    pub fn hash(&self, salt: &[u8; 32], iter: u32) -> SecretArray<32> {
        let mut boxed = SecretArray::<32>::zero();
        let mut hasher = self.prepared_password.clone();
        hasher.update(salt);

        boxed.with_buf_mut(|workmemory| {
            hasher.finalize_into((&mut *workmemory).into());

            for _ in 0..iter {
                let mut hasher = Sha256::new();
                hasher.update(&*workmemory);
                hasher.finalize_into((&mut *workmemory).into());
            }
        });

        boxed
    }
}

/// `SHA256(P)`, compared against the stored header hash to authenticate the
/// passphrase.
pub fn v3_verification_hash(stretched: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(stretched);
    hasher.finalize().into()
}
