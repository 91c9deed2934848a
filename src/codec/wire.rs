//! V1/V2 field wire framing: 4-byte LE length, 4-byte LE type, payload
//! padded to a multiple of the 8-byte block.
//!
//! The length/type header is itself exactly one block, so it is read and
//! written through the same block cipher as the payload that follows.

use std::io::{Read, Write};

use crate::codec::cipher_stream::{BlockDecryptor, BlockEncryptor};
use crate::error::Internal;

fn payload_block_count(length: usize) -> usize {
    if length == 0 {
        1
    } else {
        (length + 7) / 8
    }
}

/// Reads one field. `Ok(None)` means the stream ended cleanly at a block
/// boundary before any header bytes were read — the normal way a record
/// (or the whole stream, for V1) ends.
pub fn read_field(dec: &mut BlockDecryptor, reader: &mut impl Read) -> Result<Option<(u8, Vec<u8>)>, Internal> {
    let header = match dec.decrypt_block(reader) {
        Ok(block) => block,
        Err(Internal::EndOfFile) => return Ok(None),
        Err(Internal::Truncated) => return Err(Internal::Truncated),
    };
    let length = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
    let id = header[4];

    let mut payload = Vec::with_capacity(payload_block_count(length) * 8);
    for _ in 0..payload_block_count(length) {
        let block = dec.decrypt_block(reader).map_err(|_| Internal::Truncated)?;
        payload.extend_from_slice(&block);
    }
    payload.truncate(length);
    Ok(Some((id, payload)))
}

/// Writes one field, zero-padding the final payload block deterministically
///.
pub fn write_field(enc: &mut BlockEncryptor, writer: &mut impl Write, id: u8, data: &[u8]) -> std::io::Result<()> {
    let mut header = [0u8; 8];
    header[0..4].copy_from_slice(&(data.len() as u32).to_le_bytes());
    header[4] = id;
    enc.encrypt_block(writer, &header)?;

    let block_count = payload_block_count(data.len());
    let mut pos = 0;
    for _ in 0..block_count {
        let mut block = [0u8; 8];
        let take = (data.len() - pos).min(8);
        block[..take].copy_from_slice(&data[pos..pos + take]);
        pos += take;
        enc.encrypt_block(writer, &block)?;
    }
    Ok(())
}
