//! Seekable stream adapter over a backend file handle.
//!
//! A [`Stream`] wraps one [`FileHandle`](crate::backend::FileHandle) and
//! exposes generic size/seek/read/write/close operations with origin-relative
//! seeking. It is the value handed to format decoders, which consume it through
//! the `std::io::{Read, Seek, Write}` impls without knowing whether the bytes
//! come from a directory, an archive, or memory.
//!
//! The adapter is a small state machine: OPEN(read) or OPEN(write), then
//! CLOSED. CLOSED is terminal; the only operation that succeeds on a closed
//! stream is another `close`, which is an idempotent no-op. Dropping a stream
//! without closing releases the handle exactly once.

use crate::backend::FileHandle;
use crate::error::{VfsError, VfsResult};
use std::io;

/// Reference point for a seek offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Offset from the beginning of the file.
    Start,
    /// Offset from the current position.
    Current,
    /// Offset from the end of the file (usually negative).
    End,
}

/// Whether a stream was opened for reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Read,
    Write,
}

/// Generic seekable stream over one open backend file.
pub struct Stream {
    /// `None` once closed. The handle is released at most once.
    handle: Option<Box<dyn FileHandle>>,
    mode: StreamMode,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("mode", &self.mode)
            .field("closed", &self.handle.is_none())
            .finish()
    }
}

impl Stream {
    /// Wrap an already-open backend handle.
    ///
    /// The stream takes exclusive ownership and will close the handle exactly
    /// once, on `close` or on drop.
    pub fn new(handle: Box<dyn FileHandle>, mode: StreamMode) -> Self {
        Self {
            handle: Some(handle),
            mode,
        }
    }

    /// The mode this stream was opened in.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Whether `close` has already run.
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    fn handle_mut(&mut self) -> VfsResult<&mut Box<dyn FileHandle>> {
        self.handle.as_mut().ok_or(VfsError::Closed)
    }

    /// Total length of the underlying file in bytes.
    pub fn size(&mut self) -> VfsResult<u64> {
        let handle = self.handle_mut()?;
        handle.length().map_err(|e| VfsError::io("size", e))
    }

    /// Current absolute position.
    pub fn position(&mut self) -> VfsResult<u64> {
        let handle = self.handle_mut()?;
        handle.tell().map_err(|e| VfsError::io("tell", e))
    }

    /// Reposition the stream and return the new absolute position.
    ///
    /// `seek(0, Origin::Current)` is a pure position query: it never issues a
    /// backend seek. Any target before byte zero fails with
    /// [`VfsError::SeekOutOfRange`] without touching the backend.
    pub fn seek(&mut self, offset: i64, origin: Origin) -> VfsResult<u64> {
        let handle = self.handle_mut()?;

        let target: i64 = match origin {
            Origin::Start => offset,
            Origin::Current => {
                // Never assume position 0 when the backend cannot say
                let current = handle.tell().map_err(|e| VfsError::io("seek", e))?;
                if offset == 0 {
                    return Ok(current);
                }
                current as i64 + offset
            }
            Origin::End => {
                let length = handle.length().map_err(|e| VfsError::io("seek", e))?;
                length as i64 + offset
            }
        };

        if target < 0 {
            return Err(VfsError::SeekOutOfRange { target });
        }

        handle
            .seek_to(target as u64)
            .map_err(|e| VfsError::io("seek", e))?;
        Ok(target as u64)
    }

    /// Read whole items of `item_size` bytes into `buf`.
    ///
    /// Returns the number of complete items read. A short count with `Ok` means
    /// end of file was reached; that is not an error. An `Err` is a genuine
    /// backend fault, and any bytes the backend already placed in `buf` are not
    /// reported in a count (compatibility behavior, kept deliberately).
    pub fn read_items(&mut self, buf: &mut [u8], item_size: usize) -> VfsResult<usize> {
        if item_size == 0 {
            return Err(VfsError::InvalidArgument("item size of zero".into()));
        }
        let handle = self.handle_mut()?;

        let mut filled = 0;
        while filled < buf.len() {
            match handle.read_bytes(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => return Err(VfsError::io("read", e)),
            }
        }
        Ok(filled / item_size)
    }

    /// Read up to `buf.len()` bytes; returns the byte count.
    pub fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.read_items(buf, 1)
    }

    /// Write whole items of `item_size` bytes from `data`.
    ///
    /// Returns the number of complete items accepted by the backend. A short
    /// count means the backend stopped taking bytes mid-way.
    pub fn write_items(&mut self, data: &[u8], item_size: usize) -> VfsResult<usize> {
        if item_size == 0 {
            return Err(VfsError::InvalidArgument("item size of zero".into()));
        }
        let handle = self.handle_mut()?;

        let mut written = 0;
        while written < data.len() {
            match handle.write_bytes(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) => return Err(VfsError::io("write", e)),
            }
        }
        if written != data.len() {
            tracing::warn!(requested = data.len(), written, "short write");
        }
        Ok(written / item_size)
    }

    /// Write all of `data`; returns the byte count.
    pub fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        self.write_items(data, 1)
    }

    /// Close the stream, releasing the backend handle.
    ///
    /// Idempotent: closing an already-closed stream returns `Ok`. If the
    /// backend reports a failure while closing, the error is returned but the
    /// handle is still released and the stream is CLOSED. A failed close never
    /// leaves the stream reusable or double-closable.
    pub fn close(&mut self) -> VfsResult<()> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        handle.close().map_err(|e| VfsError::io("close", e))
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.close() {
                tracing::debug!(error = %e, "close failed during drop");
            }
        }
    }
}

impl io::Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Stream::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for Stream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let handle = self.handle_mut().map_err(io::Error::from)?;
        handle.write_bytes(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for Stream {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, origin) = match pos {
            io::SeekFrom::Start(n) => (n as i64, Origin::Start),
            io::SeekFrom::Current(n) => (n, Origin::Current),
            io::SeekFrom::End(n) => (n, Origin::End),
        };
        Stream::seek(self, offset, origin).map_err(io::Error::from)
    }
}
