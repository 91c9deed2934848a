//! The in-memory cage: keeps decrypted records unreadable at rest between
//! accesses.
//!
//! Reuses the same `cipher`/`cbc`/`block-padding` machinery the on-disk V3
//! codec depends on for its record-layer stream, here turned inward on a
//! process-local key instead of the user's passphrase. The memory key itself
//! lives in a `secrets::SecretVec<u8>`, a zero-on-drop buffer.

use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use secrets::SecretVec;

use crate::crypto::cipher::{BlowfishCbcDec, BlowfishCbcEnc};
use crate::error::{Error, Result};
use crate::random::fill_random;
use crate::record::Record;

const KEY_LENGTH: usize = 16;
const IV_LENGTH: usize = 8;

/// A record, sealed under the cage's memory key. Holds no plaintext.
#[derive(Clone)]
pub struct SealedRecord {
    ciphertext: Vec<u8>,
}

enum CageState {
    Uninitialized,
    Active { key: SecretVec<u8>, iv: [u8; IV_LENGTH] },
    Disposed,
}

/// Lazily keys itself on first use; every subsequent `seal`/`unseal` reuses
/// the same key until `dispose()`, after which every operation fails with
/// `Error::Disposed`.
pub struct MemoryCage {
    state: CageState,
}

impl MemoryCage {
    pub fn new() -> MemoryCage {
        MemoryCage {
            state: CageState::Uninitialized,
        }
    }

    fn ensure_active(&mut self) -> Result<(&SecretVec<u8>, [u8; IV_LENGTH])> {
        if matches!(self.state, CageState::Disposed) {
            return Err(Error::Disposed);
        }
        if matches!(self.state, CageState::Uninitialized) {
            let mut key = SecretVec::<u8>::zero(KEY_LENGTH);
            {
                let mut borrow = key.borrow_mut();
                fill_random(&mut borrow);
            }
            let mut iv = [0u8; IV_LENGTH];
            fill_random(&mut iv);
            self.state = CageState::Active { key, iv };
        }
        match &self.state {
            CageState::Active { key, iv } => Ok((key, *iv)),
            _ => unreachable!("just activated"),
        }
    }

    /// Serializes and encrypts `record` under the cage's memory key.
    pub fn seal(&mut self, record: &Record) -> Result<SealedRecord> {
        self.seal_bytes(&record.to_sealable_bytes())
    }

    /// Decrypts and deserializes a previously sealed record.
    ///
    /// Any cipher or padding failure is `MemoryKeyError`: a sealed record
    /// was always produced by this same cage, so a failure here means the
    /// cage's own state (or the sealed bytes) has been corrupted, never
    /// something a caller triggered.
    pub fn unseal(&mut self, sealed: &SealedRecord) -> Result<Record> {
        let owned = self.unseal_bytes(sealed)?;
        Record::from_sealable_bytes(&owned.borrow())
    }

    /// Encrypts arbitrary bytes under the cage's memory key — used for the
    /// sealed passphrase, which isn't a [`Record`] and so can't go through
    /// [`MemoryCage::seal`].
    pub fn seal_bytes(&mut self, plaintext: &[u8]) -> Result<SealedRecord> {
        let (key, iv) = self.ensure_active()?;
        let key_ref = key.borrow();
        let ciphertext = BlowfishCbcEnc::new(key_ref.as_slice().into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        Ok(SealedRecord { ciphertext })
    }

    /// The inverse of [`MemoryCage::seal_bytes`]. Returns the plaintext in a
    /// zero-on-drop buffer since a caller unsealing a passphrase wants the
    /// same memory hygiene a record's plaintext gets during `unseal`.
    pub fn unseal_bytes(&mut self, sealed: &SealedRecord) -> Result<SecretVec<u8>> {
        let (key, iv) = self.ensure_active()?;
        let key_ref = key.borrow();
        let mut buffer = sealed.ciphertext.clone();
        let plaintext_len = BlowfishCbcDec::new(key_ref.as_slice().into(), &iv.into())
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|_| Error::MemoryKeyError)?
            .len();
        let mut owned = SecretVec::<u8>::zero(plaintext_len);
        owned.borrow_mut().copy_from_slice(&buffer[..plaintext_len]);
        Ok(owned)
    }

    /// Reseeds the IV. Existing sealed records become unreadable under the
    /// new IV, so callers must reseal everything in the same pass (the
    /// database's save path does this implicitly by unsealing and
    /// resealing every record anyway).
    pub fn rotate_iv(&mut self) -> Result<()> {
        match &mut self.state {
            CageState::Disposed => Err(Error::Disposed),
            CageState::Active { iv, .. } => {
                fill_random(iv);
                Ok(())
            }
        }
    }

    /// Zeroes the key and IV. All subsequent operations fail with `Disposed`.
    pub fn dispose(&mut self) {
        self.state = CageState::Disposed;
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, CageState::Disposed)
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self.state, CageState::Active { .. })
    }
}

impl Default for MemoryCage {
    fn default() -> Self {
        MemoryCage::new()
    }
}

impl Drop for MemoryCage {
    fn drop(&mut self) {
        self.dispose();
    }
}
