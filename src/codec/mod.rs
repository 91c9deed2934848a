//! The file codec: header layout, block-chained record stream, and
//! end-of-file framing, distinct per version family.
//!
//! V1/V2 share one streaming codec parameterized by whether the cipher
//! chains blocks (`cipher_stream`); V3 buffers the whole stream up front
//! since its framing requires locating the HMAC/EOF trailer before
//! anything can be decrypted (see `v3`).

pub mod cipher_stream;
pub mod header;
pub mod v1v2;
pub mod v3;
pub mod wire;
