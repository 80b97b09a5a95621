use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// An in-memory diagnostics sink with shared ownership.
///
/// One clone is handed to the SWC [swc_core::common::errors::EmitterWriter],
/// the other is kept to read the rendered diagnostics back.
pub struct SharedCursor {
    inner: Arc<Mutex<Cursor<Vec<u8>>>>
}

impl SharedCursor {
    /// Constructs a new, empty [SharedCursor].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Cursor::new(Vec::new())))
        }
    }

    // A panicking writer can't leave the buffer half-initialised, so a
    // poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, Cursor<Vec<u8>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the non-empty lines written so far.
    pub fn lines(&self) -> Result<Vec<String>, std::string::FromUtf8Error> {
        let written = String::from_utf8(self.lock().get_ref().clone())?;

        Ok(written
            .lines()
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
            .collect())
    }
}

impl Clone for SharedCursor {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner)
        }
    }
}

impl Write for SharedCursor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.lock().flush()
    }
}
