//! Injected logging capability.
//!
//! A small capability passed explicitly to [`crate::database::Database`] and
//! [`crate::store::EntryStore`] at construction time, so nothing in this
//! crate ever reaches for a global or thread-local sink.

/// Severity of a logged event, independent of any particular backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
}

/// A capability for recording diagnostic events.
///
/// Implement this to plug the crate's internal diagnostics into whatever
/// logging backend a host application already uses.
pub trait Logger {
    fn log(&self, level: Level, message: &str);
}

/// Discards every event. The default when no logger is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Forwards events to the `tracing` crate's active dispatcher.
///
/// This is the adapter a host application reaches for when it already runs a
/// `tracing` subscriber; the crate itself never calls `tracing::*!` macros
/// from inside core logic, only from here.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!("{}", message),
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// An in-memory `Write` sink a `tracing-subscriber` `fmt` layer can be
    /// pointed at, so the test can assert on what actually got logged rather
    /// than only that `log()` didn't panic.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = SharedBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn tracing_logger_forwards_to_the_installed_subscriber() {
        let buffer = SharedBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        TracingLogger.log(Level::Warn, "update() called with an unchanged entry");

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(written.contains("update() called with an unchanged entry"));
    }
}
