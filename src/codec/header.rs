//! The V1/V2 header: `RandStuff`/`RandHash`/`Salt`/`IpThing`.
//!
//! V1 and V2 share this exact header shape and the same
//! `key = SHA1(passphrase || salt)` derivation; nothing in
//! the header distinguishes the two families from each other, only V3's
//! `"PWS3"` magic is self-describing — a caller opening a V1/V2 file tells
//! [`crate::database::Database::open`] which family to expect.

use std::io::{Read, Write};

use sha1::Sha1;
use sha2::Digest;

use crate::crypto::cipher::blowfish_ecb_encrypt_block;
use crate::crypto::stretch::stretch_v1v2;
use crate::error::{Error, Result};
use crate::random::fill_random;

pub const RAND_STUFF_LEN: usize = 8;
pub const RAND_HASH_LEN: usize = 20;
pub const SALT_LEN: usize = 20;
pub const IV_LEN: usize = 8;

/// The stretched record-layer key (`SHA1(passphrase || salt)`) plus the
/// header IV, the only two things V1/V2's codec needs out of the header
/// once authentication has succeeded.
pub struct V1V2Header {
    pub rand_stuff: [u8; RAND_STUFF_LEN],
    pub rand_hash: [u8; RAND_HASH_LEN],
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
}

impl V1V2Header {
    /// Builds a fresh header authenticating `passphrase`, as `save`/`create`
    /// do before rewriting the record stream. Returns the header and the
    /// stretched key record encryption uses.
    pub fn create(passphrase: &[u8]) -> (V1V2Header, [u8; 20]) {
        let mut salt = [0u8; SALT_LEN];
        fill_random(&mut salt);
        let key = stretch_v1v2(passphrase, &salt);

        let mut rand_stuff = [0u8; RAND_STUFF_LEN];
        fill_random(&mut rand_stuff);
        let rand_hash = compute_rand_hash(&key, &rand_stuff);

        let mut iv = [0u8; IV_LEN];
        fill_random(&mut iv);

        (
            V1V2Header {
                rand_stuff,
                rand_hash,
                salt,
                iv,
            },
            key,
        )
    }

    pub fn read(reader: &mut impl Read) -> Result<V1V2Header> {
        let mut rand_stuff = [0u8; RAND_STUFF_LEN];
        reader.read_exact(&mut rand_stuff).map_err(|_| Error::CorruptFile)?;
        let mut rand_hash = [0u8; RAND_HASH_LEN];
        reader.read_exact(&mut rand_hash).map_err(|_| Error::CorruptFile)?;
        let mut salt = [0u8; SALT_LEN];
        reader.read_exact(&mut salt).map_err(|_| Error::CorruptFile)?;
        let mut iv = [0u8; IV_LEN];
        reader.read_exact(&mut iv).map_err(|_| Error::CorruptFile)?;
        Ok(V1V2Header {
            rand_stuff,
            rand_hash,
            salt,
            iv,
        })
    }

    pub fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&self.rand_stuff)?;
        writer.write_all(&self.rand_hash)?;
        writer.write_all(&self.salt)?;
        writer.write_all(&self.iv)?;
        Ok(())
    }

    /// Derives the record-layer key from `passphrase` and this header's
    /// salt, then checks it against `rand_hash`. `Ok` carries the key V1
    /// uses directly (ECB) or V2 chains with `self.iv` (CBC).
    pub fn authenticate(&self, passphrase: &[u8]) -> Result<[u8; 20]> {
        let key = stretch_v1v2(passphrase, &self.salt);
        if compute_rand_hash(&key, &self.rand_stuff) == self.rand_hash {
            Ok(key)
        } else {
            Err(Error::WrongPassphrase)
        }
    }
}

/// `RandHash`: `SHA1` of 1000 rounds of Blowfish-ECB re-encryption of
/// `RandStuff` under the record-layer key, the documented Password Safe
/// V1/V2 passphrase authenticator.
fn compute_rand_hash(key: &[u8], rand_stuff: &[u8; RAND_STUFF_LEN]) -> [u8; RAND_HASH_LEN] {
    let mut block = *rand_stuff;
    for _ in 0..1000 {
        blowfish_ecb_encrypt_block(key, &mut block);
    }
    let mut hasher = Sha1::new();
    hasher.update(block);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_authenticate_round_trips() {
        let (header, key) = V1V2Header::create(b"hunter2");
        let authenticated = header.authenticate(b"hunter2").unwrap();
        assert_eq!(authenticated, key);
    }

    #[test]
    fn wrong_passphrase_is_rejected() {
        let (header, _) = V1V2Header::create(b"hunter2");
        assert!(matches!(header.authenticate(b"wrong"), Err(Error::WrongPassphrase)));
    }

    #[test]
    fn header_round_trips_through_bytes() {
        let (header, _) = V1V2Header::create(b"hunter2");
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), RAND_STUFF_LEN + RAND_HASH_LEN + SALT_LEN + IV_LEN);
        let restored = V1V2Header::read(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(restored.rand_stuff, header.rand_stuff);
        assert_eq!(restored.salt, header.salt);
    }
}
