//! Scoped access to a rewindable request body

use std::io::{self, Read, Seek, SeekFrom};
use tracing::error;

/// Borrow of a request body that puts the read position back on drop.
///
/// Whatever happens while the guard is alive (a parse error, an early reject,
/// a panic) the body is left at the position it had when the guard was
/// acquired, so the next stage can read it from the start.
pub struct RewindGuard<'a, B: Read + Seek> {
    body: &'a mut B,
    origin: u64,
}

impl<'a, B: Read + Seek> RewindGuard<'a, B> {
    pub fn acquire(body: &'a mut B) -> io::Result<Self> {
        let origin = body.stream_position()?;
        Ok(Self { body, origin })
    }

    /// Position the body will be restored to
    pub fn origin(&self) -> u64 {
        self.origin
    }
}

impl<B: Read + Seek> Read for RewindGuard<'_, B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl<B: Read + Seek> Drop for RewindGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.body.seek(SeekFrom::Start(self.origin)) {
            error!(error = %e, origin = self.origin, "Failed to rewind request body");
        }
    }
}
