//! Real-directory backend.
//!
//! Provides access to files under one filesystem directory, with optional
//! read-only mode. Paths never escape the root.

use super::{Backend, FileHandle};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Backend over a real filesystem directory.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/assets`, then `open_read("img/logo.png")` opens
/// `/home/amy/assets/img/logo.png`.
#[derive(Debug, Clone)]
pub struct DirBackend {
    root: PathBuf,
    read_only: bool,
}

impl DirBackend {
    /// Open a backend rooted at the given directory.
    ///
    /// Fails if the path does not exist or is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let meta = fs::metadata(&root)?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", root.display()),
            ));
        }
        Ok(Self {
            root,
            read_only: false,
        })
    }

    /// Open a read-only backend rooted at the given directory.
    pub fn open_read_only(root: impl Into<PathBuf>) -> io::Result<Self> {
        let mut backend = Self::open(root)?;
        backend.read_only = true;
        Ok(backend)
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a backend-relative path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root via `..`.
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                std::path::Component::RootDir
                | std::path::Component::CurDir
                | std::path::Component::Prefix(_) => {}
                std::path::Component::ParentDir => {
                    if !resolved.pop() || !resolved.starts_with(&self.root) {
                        return Err(io::Error::new(
                            io::ErrorKind::PermissionDenied,
                            format!("path escapes root: {}", path.display()),
                        ));
                    }
                }
                std::path::Component::Normal(s) => resolved.push(s),
            }
        }
        Ok(resolved)
    }
}

impl Backend for DirBackend {
    fn contains(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok(full) => full.exists(),
            Err(_) => false,
        }
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        let full = self.resolve(path)?;
        let file = File::open(full)?;
        Ok(Box::new(DirHandle { file }))
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::ReadOnlyFilesystem,
                format!("read-only mount: {}", self.root.display()),
            ));
        }
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(full)?;
        Ok(Box::new(DirHandle { file }))
    }

    fn enumerate(&self, dir: &Path) -> io::Result<Vec<String>> {
        let full = self.resolve(dir)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(full)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

/// Open file inside a [`DirBackend`].
struct DirHandle {
    file: File,
}

impl FileHandle for DirHandle {
    fn length(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write(data)
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
