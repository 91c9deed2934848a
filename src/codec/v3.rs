//! The V3 file codec: `"PWS3"` header, whole-buffer
//! Twofish-CBC body, trailing `HMAC-SHA256` over the field payloads.
//!
//! This codec drives `cbc::Encryptor`/`Decryptor` one block at a time with
//! no padding step at all, rather than reaching for `cbc`'s `ZeroPadding`
//! helpers: V3's body is already an exact multiple of 16 bytes by
//! construction, and `ZeroPadding`'s unpad strips trailing zero bytes from
//! the *decrypted* plaintext, which would silently truncate a field whose
//! real payload happens to end in a zero byte. Driving the cipher
//! block-by-block keeps every byte of that payload intact.

use std::io::{Read, Write};

use cipher::{generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::cipher::{twofish_ecb_decrypt_block, twofish_ecb_encrypt_block, TwofishCbcDec, TwofishCbcEnc};
use crate::crypto::stretch::{v3_verification_hash, V3Stretch};
use crate::error::{Error, Internal, Result};
use crate::field::{Field, FieldType};
use crate::random::fill_random;
use crate::record::Record;

pub const DEFAULT_ITERATIONS: u32 = 2048;

const EOF_MARKER: [u8; 16] = *b"PWS3-EOFPWS3-EOF";
type HmacSha256 = Hmac<Sha256>;

struct BufferedField<'a> {
    field_type: u8,
    field_data: &'a [u8],
    consumed: usize,
    block_tail: &'a [u8],
}

/// Parses one field out of `data`, Password Safe's odd "length/type live in
/// the first block, payload continues in 16-byte chunks from the 11th byte
/// on" framing. `Ok(None)` means `data` is exhausted cleanly;
/// `Err` means the length in the header runs past the end of `data`.
fn next_buffered_field(data: &[u8]) -> std::result::Result<Option<BufferedField<'_>>, Internal> {
    if data.is_empty() {
        return Ok(None);
    }
    if data.len() < 16 {
        return Err(Internal::Truncated);
    }
    let header: [u8; 16] = data[..16].try_into().unwrap();
    let field_length = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
    let field_type = header[4];

    let data_containing_tail = &data[5..];
    if field_length > data_containing_tail.len() {
        return Err(Internal::Truncated);
    }

    let mut block_tail = &data[16..];
    let mut remaining = field_length;
    while remaining > 11 {
        if block_tail.len() < 16 {
            return Err(Internal::Truncated);
        }
        block_tail = &block_tail[16..];
        remaining = remaining.saturating_sub(16);
    }

    Ok(Some(BufferedField {
        field_type,
        field_data: &data_containing_tail[..field_length],
        consumed: data.len() - block_tail.len(),
        block_tail,
    }))
}

/// Drives `cipher` over `data` one 16-byte block at a time, in place.
fn cbc_decrypt_in_place(cipher: &mut TwofishCbcDec, data: &mut [u8]) -> Result<()> {
    if data.len() % 16 != 0 {
        return Err(Error::CorruptFile);
    }
    for chunk in data.chunks_mut(16) {
        cipher.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
    Ok(())
}

fn cbc_encrypt_in_place(cipher: &mut TwofishCbcEnc, data: &mut [u8]) {
    for chunk in data.chunks_mut(16) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

/// An opened V3 file: header parsed, passphrase authenticated, body
/// decrypted and HMAC-verified up front (the whole point of buffering —
/// V3's trailer can only be located after the plaintext is in hand).
pub struct Reader {
    buffer: Vec<u8>,
    pos: usize,
    pub iterations: u32,
}

impl Reader {
    pub fn open(mut inner: impl Read, passphrase: &[u8]) -> Result<Reader> {
        let mut tag = [0u8; 4];
        inner.read_exact(&mut tag).map_err(|_| Error::UnsupportedFileVersion)?;
        if &tag != b"PWS3" {
            return Err(Error::UnsupportedFileVersion);
        }

        let mut salt = [0u8; 32];
        inner.read_exact(&mut salt).map_err(|_| Error::CorruptFile)?;
        let mut iter_bytes = [0u8; 4];
        inner.read_exact(&mut iter_bytes).map_err(|_| Error::CorruptFile)?;
        let iterations = u32::from_le_bytes(iter_bytes);
        let mut stored_hash = [0u8; 32];
        inner.read_exact(&mut stored_hash).map_err(|_| Error::CorruptFile)?;

        let mut k = [0u8; 32];
        let mut l = [0u8; 32];
        let mut iv = [0u8; 16];
        inner.read_exact(&mut k).map_err(|_| Error::CorruptFile)?;
        inner.read_exact(&mut l).map_err(|_| Error::CorruptFile)?;
        inner.read_exact(&mut iv).map_err(|_| Error::CorruptFile)?;

        let key = V3Stretch::new(passphrase).hash(&salt, iterations).as_array();
        if v3_verification_hash(&key) != stored_hash {
            return Err(Error::WrongPassphrase);
        }

        for chunk in k.chunks_exact_mut(16) {
            twofish_ecb_decrypt_block(&key, chunk.try_into().unwrap());
        }
        for chunk in l.chunks_exact_mut(16) {
            twofish_ecb_decrypt_block(&key, chunk.try_into().unwrap());
        }

        let mut rest = Vec::new();
        inner.read_to_end(&mut rest).map_err(Error::from)?;
        let body_len = rest.len().checked_sub(48).ok_or(Error::CorruptFile)?;
        if body_len % 16 != 0 {
            return Err(Error::CorruptFile);
        }

        let (body, tail) = rest.split_at_mut(body_len);
        let (eof, mac) = tail.split_at(16);
        if eof != EOF_MARKER {
            return Err(Error::CorruptFile);
        }
        let stored_mac: [u8; 32] = mac.try_into().unwrap();

        let mut decryptor = TwofishCbcDec::new_from_slices(&k, &iv).map_err(|_| Error::CryptoInitError)?;
        cbc_decrypt_in_place(&mut decryptor, body)?;

        let mut hmac = HmacSha256::new_from_slice(&l).map_err(|_| Error::CryptoInitError)?;
        let mut cursor = &body[..];
        loop {
            match next_buffered_field(cursor).map_err(|_| Error::CorruptFile)? {
                None => break,
                Some(field) => {
                    hmac.update(field.field_data);
                    cursor = field.block_tail;
                }
            }
        }
        hmac.verify_slice(&stored_mac).map_err(|_| Error::WrongPassphrase)?;

        Ok(Reader {
            buffer: body.to_vec(),
            pos: 0,
            iterations,
        })
    }

    fn read_field(&mut self) -> Result<Option<(u8, Vec<u8>)>> {
        let field = next_buffered_field(&self.buffer[self.pos..]).map_err(|_| Error::CorruptFile)?;
        match field {
            None => Ok(None),
            Some(field) => {
                let data = field.field_data.to_vec();
                let ty = field.field_type;
                self.pos += field.consumed;
                Ok(Some((ty, data)))
            }
        }
    }

    /// Reads the next record, or `Ok(None)` at clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let mut fields = Vec::new();
        loop {
            match self.read_field()? {
                None => {
                    return if fields.is_empty() {
                        Ok(None)
                    } else {
                        Err(Error::CorruptFile)
                    };
                }
                Some((id, data)) => {
                    let field = crate::version::PwsafeVersion::V3.decode_field(id, data)?;
                    let is_eor = field.is_end_of_record();
                    fields.push(field);
                    if is_eor {
                        return Ok(Some(Record::new(crate::version::PwsafeVersion::V3, fields)));
                    }
                }
            }
        }
    }
}

/// A V3 file opened for writing: header (with freshly generated K/L/IV key
/// material) already written, field payloads buffered until [`Writer::finish`]
/// CBC-encrypts and HMACs them in one pass — ciphertext can't be emitted
/// until the whole stream is in hand, since the HMAC covers every payload.
pub struct Writer<W> {
    inner: W,
    buffer: Vec<u8>,
    k: [u8; 32],
    iv: [u8; 16],
    hmac: HmacSha256,
}

impl<W: Write> Writer<W> {
    pub fn create(mut inner: W, passphrase: &[u8], iterations: u32) -> Result<Writer<W>> {
        inner.write_all(b"PWS3")?;

        let mut salt = [0u8; 32];
        fill_random(&mut salt);
        inner.write_all(&salt)?;
        inner.write_all(&iterations.to_le_bytes())?;

        let key = V3Stretch::new(passphrase).hash(&salt, iterations).as_array();
        inner.write_all(&v3_verification_hash(&key))?;

        let mut k = [0u8; 32];
        let mut l = [0u8; 32];
        let mut iv = [0u8; 16];
        fill_random(&mut k);
        fill_random(&mut l);
        fill_random(&mut iv);

        let hmac = HmacSha256::new_from_slice(&l).map_err(|_| Error::CryptoInitError)?;

        let mut k_wrapped = k;
        let mut l_wrapped = l;
        for chunk in k_wrapped.chunks_exact_mut(16) {
            twofish_ecb_encrypt_block(&key, chunk.try_into().unwrap());
        }
        for chunk in l_wrapped.chunks_exact_mut(16) {
            twofish_ecb_encrypt_block(&key, chunk.try_into().unwrap());
        }
        inner.write_all(&k_wrapped)?;
        inner.write_all(&l_wrapped)?;
        inner.write_all(&iv)?;

        Ok(Writer {
            inner,
            buffer: Vec::new(),
            k,
            iv,
            hmac,
        })
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        for field in record.canonical_fields() {
            let id = field.ty.to_id(record.version).unwrap_or_else(|| match field.ty {
                FieldType::Opaque(id) => id,
                _ => 0,
            });
            self.write_field(id, &record.version.encode_field(field));
        }
        Ok(())
    }

    /// Buffers one field's framed-but-unencrypted bytes: length+type in the
    /// first block's first 5 bytes, payload continuing from byte 5, every
    /// block deterministically zero-padded (not filled with extra random
    /// tail bytes), so an unmodified database re-saves byte-identical.
    fn write_field(&mut self, field_type: u8, data: &[u8]) {
        self.hmac.update(data);
        let mut pos = 0usize;
        let mut first = true;
        loop {
            let mut block = [0u8; 16];
            let mut offset = 0usize;
            if first {
                block[0..4].copy_from_slice(&(data.len() as u32).to_le_bytes());
                block[4] = field_type;
                offset = 5;
                first = false;
            }
            let take = (data.len() - pos).min(16 - offset);
            block[offset..offset + take].copy_from_slice(&data[pos..pos + take]);
            pos += take;
            self.buffer.extend_from_slice(&block);
            if pos >= data.len() {
                break;
            }
        }
    }

    /// Encrypts the buffered fields, writes the EOF marker, and writes the
    /// finalized HMAC, returning the underlying writer.
    ///
    /// No terminator field is written here: every record already carries
    /// its own trailing `EndOfRecord` field, so the buffer is already at a
    /// clean boundary. The `PWS3-EOF...`/HMAC trailer is split off before
    /// decrypting rather than left in the same buffer the field loop reads,
    /// so that loop just runs out of buffer at the right point with no
    /// sentinel bytes needed.
    pub fn finish(mut self) -> Result<W> {
        let mut encryptor = TwofishCbcEnc::new_from_slices(&self.k, &self.iv).map_err(|_| Error::CryptoInitError)?;
        cbc_encrypt_in_place(&mut encryptor, &mut self.buffer);
        self.inner.write_all(&self.buffer)?;
        self.inner.write_all(&EOF_MARKER)?;
        self.inner.write_all(&self.hmac.finalize().into_bytes())?;
        Ok(self.inner)
    }
}
