//! mountfs: a mountable virtual filesystem with seekable streams.
//!
//! Application code reads and writes files that may live in real directories,
//! in-memory blobs, or embedder-supplied archive backends, through one uniform
//! randomly-seekable stream interface. Consumers (image decoders, audio
//! loaders, generic byte readers) never learn where a file physically
//! resides.
//!
//! # Design
//!
//! A [`MountTable`] holds an ordered set of backends, each visible under a
//! virtual mount point:
//!
//! ```text
//! (virtual root)
//! ├── res/          # DirBackend over ./assets        (ro or rw)
//! ├── res/data.bin  # MemBackend blob mount           (ro)
//! └── save/         # MemBackend scratch tree         (rw)
//! ```
//!
//! Resolution walks mount points longest-prefix first and returns the first
//! backend that contains the path. Opening a path yields a [`Stream`], which
//! wraps the backend's file handle and implements `std::io::{Read, Seek,
//! Write}` alongside its native size/seek/read/write/close surface.
//!
//! Everything is synchronous and blocking; callers needing concurrency
//! serialize access externally. Errors are plain values: every fallible
//! operation returns [`VfsResult`], and [`VfsError`] carries the failing
//! operation plus the backend's diagnostic.
//!
//! # Example
//!
//! ```no_run
//! use mountfs::MountTable;
//!
//! let mut table = MountTable::new();
//! table.mount("assets", "res", true)?;
//! table.mount_scratch("save", "save", true)?;
//!
//! let config = table.load("res/config.ron")?;
//! table.store("save/slot0.dat", &config)?;
//! # Ok::<(), mountfs::VfsError>(())
//! ```

pub mod backend;
pub mod error;
pub mod loader;
pub mod stream;
pub mod table;

pub use backend::{Backend, DirBackend, FileHandle, MemBackend};
pub use error::{VfsError, VfsResult};
pub use stream::{Origin, Stream, StreamMode};
pub use table::{MountInfo, MountTable};
