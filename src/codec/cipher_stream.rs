//! Manual block-chained encrypt/decrypt over a streaming reader/writer.
//!
//! V1 has no chaining: every 8-byte block is decrypted independently under
//! raw Blowfish ECB. V2 chains blocks CBC-style over the header IV. Both
//! are small enough to hand-roll a block-at-a-time loop here rather than
//! reach for the `cbc` crate's whole-buffer API, which `codec::v3` uses
//! instead — V3's framing requires buffering the whole stream to locate
//! the HMAC/EOF trailer before any block can be decrypted, but V1/V2 have
//! no such trailer to locate first, so they stream one block at a time as
//! each is read or written.

use std::io::{Read, Write};

use crate::crypto::cipher::{blowfish_ecb_decrypt_block, blowfish_ecb_encrypt_block};
use crate::error::Internal;
use crate::io::block;

const BLOCK_LENGTH: usize = 8;

/// Decrypts one 8-byte block at a time, optionally chaining CBC-style.
pub struct BlockDecryptor {
    key: Vec<u8>,
    prev_ciphertext: [u8; BLOCK_LENGTH],
    chained: bool,
}

impl BlockDecryptor {
    /// V1: raw ECB, block by block.
    pub fn ecb(key: Vec<u8>) -> Self {
        BlockDecryptor {
            key,
            prev_ciphertext: [0u8; BLOCK_LENGTH],
            chained: false,
        }
    }

    /// V2: CBC chained over `iv`.
    pub fn cbc(key: Vec<u8>, iv: [u8; BLOCK_LENGTH]) -> Self {
        BlockDecryptor {
            key,
            prev_ciphertext: iv,
            chained: true,
        }
    }

    /// Reads and decrypts the next block. `Internal::EndOfFile` means the
    /// stream ended cleanly at a block boundary with no bytes consumed;
    /// anything else (a partial block) is `Internal::Truncated`.
    pub fn decrypt_block(&mut self, reader: &mut impl Read) -> Result<[u8; BLOCK_LENGTH], Internal> {
        let mut ciphertext = [0u8; BLOCK_LENGTH];
        block::read_exact(reader, &mut ciphertext)?;
        let mut plaintext = ciphertext;
        blowfish_ecb_decrypt_block(&self.key, &mut plaintext);
        if self.chained {
            for i in 0..BLOCK_LENGTH {
                plaintext[i] ^= self.prev_ciphertext[i];
            }
            self.prev_ciphertext = ciphertext;
        }
        Ok(plaintext)
    }
}

/// Encrypts one 8-byte block at a time, the write-side mirror of
/// [`BlockDecryptor`].
pub struct BlockEncryptor {
    key: Vec<u8>,
    prev_ciphertext: [u8; BLOCK_LENGTH],
    chained: bool,
}

impl BlockEncryptor {
    pub fn ecb(key: Vec<u8>) -> Self {
        BlockEncryptor {
            key,
            prev_ciphertext: [0u8; BLOCK_LENGTH],
            chained: false,
        }
    }

    pub fn cbc(key: Vec<u8>, iv: [u8; BLOCK_LENGTH]) -> Self {
        BlockEncryptor {
            key,
            prev_ciphertext: iv,
            chained: true,
        }
    }

    pub fn encrypt_block(&mut self, writer: &mut impl Write, plaintext: &[u8; BLOCK_LENGTH]) -> std::io::Result<()> {
        let mut block = *plaintext;
        if self.chained {
            for i in 0..BLOCK_LENGTH {
                block[i] ^= self.prev_ciphertext[i];
            }
        }
        blowfish_ecb_encrypt_block(&self.key, &mut block);
        if self.chained {
            self.prev_ciphertext = block;
        }
        block::write_all(writer, &block)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ecb_round_trips_a_single_block() {
        let key = b"a passphrase derived key".to_vec();
        let plaintext = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut out = Vec::new();
        BlockEncryptor::ecb(key.clone()).encrypt_block(&mut out, &plaintext).unwrap();
        let decrypted = BlockDecryptor::ecb(key).decrypt_block(&mut Cursor::new(out)).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn cbc_chains_blocks_so_identical_plaintext_differs() {
        let key = b"another key".to_vec();
        let iv = [9u8; 8];
        let plaintext = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut out = Vec::new();
        let mut enc = BlockEncryptor::cbc(key.clone(), iv);
        enc.encrypt_block(&mut out, &plaintext).unwrap();
        enc.encrypt_block(&mut out, &plaintext).unwrap();
        assert_ne!(out[0..8], out[8..16]);

        let mut cursor = Cursor::new(out);
        let mut dec = BlockDecryptor::cbc(key, iv);
        assert_eq!(dec.decrypt_block(&mut cursor).unwrap(), plaintext);
        assert_eq!(dec.decrypt_block(&mut cursor).unwrap(), plaintext);
    }
}
