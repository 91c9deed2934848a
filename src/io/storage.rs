//! The abstract storage collaborator.
//!
//! Wraps `fs::File` and `io::Cursor<Vec<u8>>` behind a trait so a `Database`
//! never depends on the filesystem directly.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// A readable stream with an explicit close.
pub trait ReadStream: Read {
    fn close(self: Box<Self>) -> Result<()>;
}

/// A writable stream with an explicit close.
pub trait WriteStream: Write {
    fn close(self: Box<Self>) -> Result<()>;
}

/// Storage backing a Password Safe database file.
pub trait Storage {
    fn open_for_read(&self) -> Result<Box<dyn ReadStream>>;
    fn open_for_write(&self) -> Result<Box<dyn WriteStream>>;
    /// Seconds since the Unix epoch, or `None` if the storage has never been written.
    fn last_modified(&self) -> Result<Option<u64>>;
    fn exists(&self) -> bool;
    fn is_writable(&self) -> bool;
}

impl ReadStream for fs::File {
    fn close(self: Box<Self>) -> Result<()> {
        drop(self);
        Ok(())
    }
}

impl WriteStream for fs::File {
    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        self.sync_all()?;
        Ok(())
    }
}

/// Storage backed by a plain filesystem path.
///
/// Path handling itself (resolution, symlinks, permissions) is the external
/// collaborator's job; this type only opens and stats the
/// path it is given.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStorage { path: path.into() }
    }
}

impl Storage for FileStorage {
    fn open_for_read(&self) -> Result<Box<dyn ReadStream>> {
        Ok(Box::new(fs::File::open(&self.path)?))
    }

    fn open_for_write(&self) -> Result<Box<dyn WriteStream>> {
        Ok(Box::new(fs::File::create(&self.path)?))
    }

    fn last_modified(&self) -> Result<Option<u64>> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = meta.modified()?;
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::CorruptFile)?
            .as_secs();
        Ok(Some(secs))
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn is_writable(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) => !meta.permissions().readonly(),
            Err(_) => true,
        }
    }
}

/// In-memory storage over a shared byte buffer, used throughout this
/// crate's own tests in place of a real file.
#[derive(Clone, Default)]
pub struct CursorStorage {
    data: Arc<Mutex<Vec<u8>>>,
    modified_at: Arc<Mutex<Option<u64>>>,
    read_only: bool,
}

impl CursorStorage {
    pub fn new() -> Self {
        CursorStorage::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        CursorStorage {
            data: Arc::new(Mutex::new(bytes)),
            modified_at: Arc::new(Mutex::new(Some(0))),
            read_only: false,
        }
    }

    pub fn read_only(bytes: Vec<u8>) -> Self {
        CursorStorage {
            data: Arc::new(Mutex::new(bytes)),
            modified_at: Arc::new(Mutex::new(Some(0))),
            read_only: true,
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().expect("storage mutex poisoned").clone()
    }
}

struct CursorRead(Cursor<Vec<u8>>);

impl Read for CursorRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl ReadStream for CursorRead {
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

struct CursorWrite {
    buffer: Vec<u8>,
    data: Arc<Mutex<Vec<u8>>>,
    modified_at: Arc<Mutex<Option<u64>>>,
    tick: u64,
}

impl Write for CursorWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteStream for CursorWrite {
    fn close(self: Box<Self>) -> Result<()> {
        *self.data.lock().expect("storage mutex poisoned") = self.buffer;
        *self.modified_at.lock().expect("storage mutex poisoned") = Some(self.tick);
        Ok(())
    }
}

impl Storage for CursorStorage {
    fn open_for_read(&self) -> Result<Box<dyn ReadStream>> {
        let data = self.data.lock().expect("storage mutex poisoned").clone();
        Ok(Box::new(CursorRead(Cursor::new(data))))
    }

    fn open_for_write(&self) -> Result<Box<dyn WriteStream>> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ok(Box::new(CursorWrite {
            buffer: Vec::new(),
            data: self.data.clone(),
            modified_at: self.modified_at.clone(),
            tick,
        }))
    }

    fn last_modified(&self) -> Result<Option<u64>> {
        Ok(*self.modified_at.lock().expect("storage mutex poisoned"))
    }

    fn exists(&self) -> bool {
        !self.data.lock().expect("storage mutex poisoned").is_empty()
    }

    fn is_writable(&self) -> bool {
        !self.read_only
    }
}

