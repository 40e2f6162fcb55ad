//! In-memory backend.
//!
//! Two uses: a writable scratch tree for ephemeral data and tests, and
//! read-only blob mounts where a caller-supplied byte buffer is exposed as a
//! single file. All data is lost when the backend is dropped.
//!
//! File bodies are shared behind `Arc`, so a handle opened before an unmount
//! keeps working after the backend itself is gone from the mount table.

use super::{Backend, FileHandle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

type Body = Arc<RwLock<Vec<u8>>>;

/// Entry in the memory backend.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Body },
    Directory,
}

/// In-memory storage backend.
///
/// Thread-safe via internal `RwLock`.
#[derive(Debug)]
pub struct MemBackend {
    entries: RwLock<HashMap<PathBuf, Entry>>,
    read_only: bool,
}

impl Default for MemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemBackend {
    /// Create a new empty writable tree.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert(PathBuf::from(""), Entry::Directory);
        Self {
            entries: RwLock::new(entries),
            read_only: false,
        }
    }

    /// Expose `bytes` as a single read-only file named `label`.
    ///
    /// This is what backs blob mounts: the layer is format-agnostic, so a raw
    /// memory image mounts as itself and any archive interpretation is left to
    /// an external [`Backend`] implementation.
    pub fn from_blob(label: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(PathBuf::from(""), Entry::Directory);
        let path = Self::normalize(&label.into());
        let mut parent = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            if let std::path::Component::Normal(s) = component {
                parent.push(s);
                entries.insert(parent.clone(), Entry::Directory);
            }
        }
        entries.insert(
            path,
            Entry::File {
                data: Arc::new(RwLock::new(bytes.into())),
            },
        );
        Self {
            entries: RwLock::new(entries),
            read_only: true,
        }
    }

    /// Normalize a path: remove leading `/`, resolve `.` and `..`.
    fn normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                std::path::Component::RootDir
                | std::path::Component::CurDir
                | std::path::Component::Prefix(_) => {}
                std::path::Component::ParentDir => {
                    result.pop();
                }
                std::path::Component::Normal(s) => {
                    result.push(s);
                }
            }
        }
        result
    }

    fn lock_err() -> io::Error {
        io::Error::other("lock poisoned")
    }
}

impl Backend for MemBackend {
    fn contains(&self, path: &Path) -> bool {
        let normalized = Self::normalize(path);
        match self.entries.read() {
            Ok(entries) => entries.contains_key(&normalized),
            Err(_) => false,
        }
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        match entries.get(&normalized) {
            Some(Entry::File { data }) => Ok(Box::new(MemHandle {
                data: Arc::clone(data),
                pos: 0,
            })),
            Some(Entry::Directory) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not found: {}", path.display()),
            )),
        }
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::ReadOnlyFilesystem,
                "read-only memory mount",
            ));
        }
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;

        if let Some(Entry::Directory) = entries.get(&normalized) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            ));
        }

        // Parent directories spring into existence, as with archive writers
        let mut parent = PathBuf::new();
        for component in normalized.parent().into_iter().flat_map(|p| p.components()) {
            if let std::path::Component::Normal(s) = component {
                parent.push(s);
                entries.entry(parent.clone()).or_insert(Entry::Directory);
            }
        }

        let data = match entries.get(&normalized) {
            Some(Entry::File { data }) => {
                // Truncate in place so prior read handles see the new contents
                data.write().map_err(|_| Self::lock_err())?.clear();
                Arc::clone(data)
            }
            _ => {
                let data: Body = Arc::new(RwLock::new(Vec::new()));
                entries.insert(
                    normalized,
                    Entry::File {
                        data: Arc::clone(&data),
                    },
                );
                data
            }
        };

        Ok(Box::new(MemHandle { data, pos: 0 }))
    }

    fn enumerate(&self, dir: &Path) -> io::Result<Vec<String>> {
        let normalized = Self::normalize(dir);
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;

        match entries.get(&normalized) {
            Some(Entry::Directory) => {}
            Some(Entry::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("not a directory: {}", dir.display()),
                ));
            }
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("not found: {}", dir.display()),
                ));
            }
        }

        let mut names = Vec::new();
        for entry_path in entries.keys() {
            if entry_path.parent() == Some(normalized.as_path()) && entry_path != &normalized {
                if let Some(name) = entry_path.file_name() {
                    names.push(name.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

/// Open file inside a [`MemBackend`].
struct MemHandle {
    data: Body,
    pos: u64,
}

impl FileHandle for MemHandle {
    fn length(&mut self) -> io::Result<u64> {
        let data = self.data.read().map_err(|_| MemBackend::lock_err())?;
        Ok(data.len() as u64)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.pos = pos;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.read().map_err(|_| MemBackend::lock_err())?;
        let start = self.pos.min(data.len() as u64) as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut data = self.data.write().map_err(|_| MemBackend::lock_err())?;
        let pos = self.pos as usize;
        // Writing past the end zero-fills the gap, matching file semantics
        if data.len() < pos {
            data.resize(pos, 0);
        }
        let overlap = bytes.len().min(data.len().saturating_sub(pos));
        data[pos..pos + overlap].copy_from_slice(&bytes[..overlap]);
        data.extend_from_slice(&bytes[overlap..]);
        self.pos += bytes.len() as u64;
        Ok(bytes.len())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_back() {
        let backend = MemBackend::new();
        let mut w = backend.open_write(Path::new("dir/file.bin")).unwrap();
        w.write_bytes(b"hello").unwrap();
        w.close().unwrap();

        assert!(backend.contains(Path::new("dir")));
        let mut r = backend.open_read(Path::new("dir/file.bin")).unwrap();
        let mut buf = [0u8; 8];
        let n = r.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(r.read_bytes(&mut buf).unwrap(), 0);
    }

    #[test]
    fn blob_mount_is_single_read_only_file() {
        let backend = MemBackend::from_blob("data.bin", b"payload".to_vec());
        assert!(backend.read_only());
        assert!(backend.contains(Path::new("data.bin")));
        assert!(backend.open_write(Path::new("data.bin")).is_err());
        assert!(backend.open_write(Path::new("other.bin")).is_err());

        let mut r = backend.open_read(Path::new("data.bin")).unwrap();
        assert_eq!(r.length().unwrap(), 7);
    }

    #[test]
    fn open_write_truncates_existing() {
        let backend = MemBackend::new();
        let mut w = backend.open_write(Path::new("f")).unwrap();
        w.write_bytes(b"long contents").unwrap();
        let mut w2 = backend.open_write(Path::new("f")).unwrap();
        w2.write_bytes(b"hi").unwrap();

        let mut r = backend.open_read(Path::new("f")).unwrap();
        assert_eq!(r.length().unwrap(), 2);
    }

    #[test]
    fn write_past_end_zero_fills() {
        let backend = MemBackend::new();
        let mut w = backend.open_write(Path::new("gap")).unwrap();
        w.seek_to(4).unwrap();
        w.write_bytes(b"x").unwrap();

        let mut r = backend.open_read(Path::new("gap")).unwrap();
        let mut buf = [0u8; 8];
        let n = r.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"\0\0\0\0x");
    }

    #[test]
    fn read_on_directory_fails() {
        let backend = MemBackend::new();
        backend.open_write(Path::new("d/f")).unwrap();
        let err = backend.open_read(Path::new("d")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
    }

    #[test]
    fn enumerate_lists_direct_children() {
        let backend = MemBackend::new();
        backend.open_write(Path::new("a.txt")).unwrap();
        backend.open_write(Path::new("sub/b.txt")).unwrap();

        let names = backend.enumerate(Path::new("")).unwrap();
        assert_eq!(names, vec!["a.txt".to_string(), "sub".to_string()]);

        let names = backend.enumerate(Path::new("sub")).unwrap();
        assert_eq!(names, vec!["b.txt".to_string()]);
    }

    #[test]
    fn path_normalization() {
        let backend = MemBackend::new();
        backend
            .open_write(Path::new("/a/b/c.txt"))
            .unwrap()
            .write_bytes(b"data")
            .unwrap();

        assert!(backend.contains(Path::new("a/b/c.txt")));
        assert!(backend.contains(Path::new("a/./b/c.txt")));
        assert!(backend.contains(Path::new("a/b/../b/c.txt")));
    }
}
