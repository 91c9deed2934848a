//! Block ciphers used by the record stream and the in-memory cage.
//!
//! V1/V2 use Blowfish (`blowfish` crate); V3 uses Twofish (`twofish` crate).
//! CBC framing goes through the `cbc` crate for both.

use blowfish::Blowfish;
use cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use twofish::Twofish;

pub type BlowfishCbcEnc = cbc::Encryptor<Blowfish>;
pub type BlowfishCbcDec = cbc::Decryptor<Blowfish>;
pub type TwofishCbcEnc = cbc::Encryptor<Twofish>;
pub type TwofishCbcDec = cbc::Decryptor<Twofish>;

/// Decrypts a single 8-byte block under raw Blowfish ECB.
///
/// Used only for the V1/V2 authentication check and by the cage's
/// record-layer key material; V1's record stream itself also runs ECB
/// block-by-block since it has no header IV.
pub fn blowfish_ecb_decrypt_block(key: &[u8], block: &mut [u8; 8]) {
    let cipher = Blowfish::new_from_slice(key).expect("blowfish accepts variable-length keys");
    let mut generic = GenericArray::clone_from_slice(block);
    cipher.decrypt_block(&mut generic);
    block.copy_from_slice(&generic);
}

pub fn blowfish_ecb_encrypt_block(key: &[u8], block: &mut [u8; 8]) {
    let cipher = Blowfish::new_from_slice(key).expect("blowfish accepts variable-length keys");
    let mut generic = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut generic);
    block.copy_from_slice(&generic);
}

/// Decrypts a single 16-byte block under raw Twofish ECB.
///
/// Used to unwrap the two stored key halves (K, L) from the V3 header.
pub fn twofish_ecb_decrypt_block(key: &[u8; 32], block: &mut [u8; 16]) {
    let cipher = Twofish::new_from_slice(key).expect("twofish key is always 32 bytes");
    let mut generic = GenericArray::clone_from_slice(block);
    cipher.decrypt_block(&mut generic);
    block.copy_from_slice(&generic);
}

pub fn twofish_ecb_encrypt_block(key: &[u8; 32], block: &mut [u8; 16]) {
    let cipher = Twofish::new_from_slice(key).expect("twofish key is always 32 bytes");
    let mut generic = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut generic);
    block.copy_from_slice(&generic);
}
