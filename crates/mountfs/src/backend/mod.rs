//! Backend traits for storage providers.
//!
//! A backend is anything that can open named entries for reading or writing:
//! a real directory, an in-memory tree, or an archive implementation supplied
//! by an embedder. The mount table only ever talks to backends through the
//! [`Backend`] trait, and streams only ever talk to open files through
//! [`FileHandle`]. Two implementations ship with the crate:
//!
//! - `DirBackend`: real filesystem directory access
//! - `MemBackend`: in-memory tree, also used for blob mounts
//!
//! Archive formats (zip and friends) are deliberately not implemented here;
//! an embedder that needs them implements `Backend` for its format and mounts
//! it like any other provider.

mod dir;
mod memory;

pub use dir::DirBackend;
pub use memory::MemBackend;

use std::io;
use std::path::Path;

/// A mountable storage provider.
///
/// All paths are relative to the backend's own root and use `/` separators;
/// the mount table strips the mount point before calling in.
pub trait Backend: Send + Sync {
    /// Whether this backend has an entry (file or directory) at `path`.
    fn contains(&self, path: &Path) -> bool;

    /// Open an entry for reading.
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn FileHandle>>;

    /// Open an entry for writing, creating it if needed and truncating if not.
    ///
    /// Returns `Err` if the backend is read-only.
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn FileHandle>>;

    /// List entry names directly under `dir`, sorted. Snapshot at call time.
    fn enumerate(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Returns true if this backend rejects all writes.
    fn read_only(&self) -> bool;
}

/// An open file inside a backend.
///
/// The handle owns its own buffering and position. End-of-file is reported by
/// `read_bytes` returning `Ok(0)`; an `Err` from any method is a genuine fault,
/// never a normal EOF.
pub trait FileHandle: Send {
    /// Total length of the file in bytes.
    ///
    /// Returns `Err` for sources that cannot report a length.
    fn length(&mut self) -> io::Result<u64>;

    /// Current absolute position.
    fn tell(&mut self) -> io::Result<u64>;

    /// Reposition to an absolute offset.
    fn seek_to(&mut self, pos: u64) -> io::Result<()>;

    /// Read up to `buf.len()` bytes. `Ok(0)` means end of file.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write up to `data.len()` bytes, returning how many were accepted.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush any buffered writes and release backend-side resources.
    ///
    /// Called at most once by the owning stream.
    fn close(&mut self) -> io::Result<()>;
}

impl std::fmt::Debug for dyn FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FileHandle")
    }
}
