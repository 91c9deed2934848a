//! Block-aligned reads and writes over a streaming source.
//!
//! Works over any `Read`/`Write`; callers stream record-by-record instead of
//! buffering a whole file (the V3 codec is the one exception — it must
//! locate the HMAC/EOF trailer before it can block-decrypt anything, so it
//! buffers the whole stream itself; see `crate::codec::v3`).

use std::io::{Read, Write};

use crate::error::Internal;

/// Rounds `n` up to a non-zero multiple of `block_length`; zero maps to one
/// full block.
pub fn allocate_buffer(n: usize, block_length: usize) -> Vec<u8> {
    debug_assert!(block_length > 0);
    let rounded = if n == 0 {
        block_length
    } else {
        let remainder = n % block_length;
        if remainder == 0 {
            n
        } else {
            n + (block_length - remainder)
        }
    };
    vec![0u8; rounded]
}

/// Reads from `reader` into `buf`, distinguishing a clean end-of-file (no
/// bytes were available at all) from a truncated read (some bytes were
/// available, but fewer than `buf.len()`).
pub fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), Internal> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).map_err(|_| Internal::Truncated)?;
        if n == 0 {
            return Err(if filled == 0 {
                Internal::EndOfFile
            } else {
                Internal::Truncated
            });
        }
        filled += n;
    }
    Ok(())
}

/// Writes all of `buf` to `writer`. `std::io::Write::write_all` already
/// guarantees no short writes are visible to callers; this exists so call
/// sites read the same regardless of whether they're writing through a
/// `WriteStream` trait object or a concrete writer.
pub fn write_all(writer: &mut impl Write, buf: &[u8]) -> std::io::Result<()> {
    writer.write_all(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn allocate_buffer_rounds_up() {
        assert_eq!(allocate_buffer(0, 8).len(), 8);
        assert_eq!(allocate_buffer(1, 8).len(), 8);
        assert_eq!(allocate_buffer(8, 8).len(), 8);
        assert_eq!(allocate_buffer(9, 8).len(), 16);
        assert_eq!(allocate_buffer(0, 16).len(), 16);
    }

    #[test]
    fn read_exact_reports_clean_eof() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let mut buf = [0u8; 8];
        assert!(matches!(read_exact(&mut cursor, &mut buf), Err(Internal::EndOfFile)));
    }

    #[test]
    fn read_exact_reports_truncation() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert!(matches!(read_exact(&mut cursor, &mut buf), Err(Internal::Truncated)));
    }

    #[test]
    fn read_exact_fills_buffer() {
        let mut cursor = Cursor::new(vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let mut buf = [0u8; 8];
        read_exact(&mut cursor, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
