use std::fmt;
use std::io;

/// A specialized `Result` type for this crate.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Errors surfaced by opening, mutating or saving a Password Safe database.
///
/// `EndOfFile` is deliberately absent here: it is an internal record-loop
/// terminator, recovered at the loop boundary in [`crate::database::Database::open`]
/// and never surfaced to a caller.
#[derive(Debug)]
pub enum Error {
    /// Header does not match any known Password Safe version family.
    UnsupportedFileVersion,
    /// Key-material verification against the stored hash failed.
    WrongPassphrase,
    /// Truncated stream, bad padding outside the key-check path, or an invalid field length.
    CorruptFile,
    /// A mutating operation was attempted on a read-only database.
    ReadOnly,
    /// The underlying storage changed since this handle was opened.
    ConcurrentModification,
    /// Iteration overlapped with a mutation on the same database.
    ConcurrentIteration,
    /// A cryptographic primitive could not be initialized. Fatal.
    CryptoInitError,
    /// Seal or unseal against the in-memory cage failed. Fatal; indicates internal corruption.
    MemoryKeyError,
    /// `make_password` was asked to honor a policy with no character class enabled.
    InvalidPassphrasePolicy,
    /// An index passed to the entry store was out of range.
    IndexOutOfRange,
    /// `EntryStore::add`/`update` was passed a sparse bean.
    SparseEntry,
    /// An operation was attempted after `dispose()`.
    Disposed,
    /// An I/O error from the underlying storage.
    IoError(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedFileVersion => write!(f, "not a recognized Password Safe database file"),
            Error::WrongPassphrase => write!(f, "invalid passphrase"),
            Error::CorruptFile => write!(f, "corrupt or truncated database file"),
            Error::ReadOnly => write!(f, "database is read-only"),
            Error::ConcurrentModification => write!(f, "storage changed underneath an open database"),
            Error::ConcurrentIteration => write!(f, "concurrent iteration and mutation on the same database"),
            Error::CryptoInitError => write!(f, "cryptographic primitive unavailable"),
            Error::MemoryKeyError => write!(f, "in-memory cage seal/unseal failed"),
            Error::InvalidPassphrasePolicy => write!(f, "passphrase policy enables no character class"),
            Error::IndexOutOfRange => write!(f, "index out of range"),
            Error::SparseEntry => write!(f, "entry store operation requires a fully populated bean"),
            Error::Disposed => write!(f, "operation attempted after dispose()"),
            Error::IoError(ref e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

/// Internal-only terminator for the block reader and record loop.
///
/// Never constructed outside `io` and `record`; always intercepted before crossing
/// back into the public [`Error`] surface.
#[derive(Debug)]
pub(crate) enum Internal {
    EndOfFile,
    Truncated,
}
