//! Read, mutate, and write Password Safe (V1/V2/V3) encrypted database files.
//!
//! The crate is organized leaf-first, mirroring component list:
//! crypto primitives and byte I/O at the bottom, the file codec and in-memory
//! cage in the middle, [`Database`] and [`store::EntryStore`] at the top.
//! Most callers only need [`Database`] directly; [`store::EntryStore`] is an
//! optional sparse-projection layer for UI/tooling code that doesn't want to
//! unseal every field of every record up front.

pub mod cage;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod field;
pub mod io;
pub mod log;
pub mod passphrase;
pub mod random;
pub mod record;
pub mod store;
pub mod version;

mod database;

pub use database::{Database, DatabaseConfig, LoadListener, NullListener, RecordIter};
pub use error::{Error, Result};
pub use field::{Field, FieldType, FieldValue};
pub use passphrase::{is_weak, make_password, PasswordPolicy};
pub use record::Record;
pub use store::{EntryStore, FieldSet, PwsEntryBean};
pub use version::PwsafeVersion;
