//! Abstract storage and block-aligned byte I/O.

pub mod block;
pub mod storage;

pub use storage::{CursorStorage, FileStorage, ReadStream, Storage, WriteStream};
