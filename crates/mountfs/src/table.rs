//! Mount table: ordered backends resolved by virtual path.
//!
//! The table keeps an ordered list of mounted backends, each visible under a
//! mount point prefix. Resolution prefers the longest matching mount point;
//! entries with equally long points are consulted in table order, and the
//! first backend that actually contains the path wins. Mounting with
//! `append = true` registers at the back of the table (lower priority for
//! ties); `append = false` registers at the front.

use crate::backend::{Backend, DirBackend, MemBackend};
use crate::error::{VfsError, VfsResult};
use crate::stream::{Stream, StreamMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One mounted backend.
struct MountEntry {
    /// Identity used for unmounting: the directory path or memory label.
    source: String,
    /// Normalized virtual prefix; empty for the root.
    point: PathBuf,
    backend: Arc<dyn Backend>,
}

/// Information about a mount, as reported by [`MountTable::mounts`].
#[derive(Debug, Clone)]
pub struct MountInfo {
    /// The source the backend was mounted from.
    pub source: String,
    /// The mount point (e.g. "res").
    pub point: PathBuf,
    /// Whether the backend rejects writes.
    pub read_only: bool,
}

/// Ordered set of mounted backends with virtual path resolution.
#[derive(Default)]
pub struct MountTable {
    mounts: Vec<MountEntry>,
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field(
                "mounts",
                &self.mounts.iter().map(|m| &m.source).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MountTable {
    /// Create a new empty mount table.
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    /// Mount a real directory at `mount_point`.
    ///
    /// Fails with [`VfsError::BackendUnavailable`] if `source` cannot be
    /// opened as a directory, and with [`VfsError::InvalidArgument`] if the
    /// same source is already mounted.
    pub fn mount(
        &mut self,
        source: impl AsRef<Path>,
        mount_point: impl AsRef<Path>,
        append: bool,
    ) -> VfsResult<()> {
        let source = source.as_ref();
        let backend = DirBackend::open(source)
            .map_err(|e| VfsError::BackendUnavailable(format!("{}: {e}", source.display())))?;
        self.mount_backend(
            source.to_string_lossy().into_owned(),
            Arc::new(backend),
            mount_point,
            append,
        )
    }

    /// Mount any backend implementation at `mount_point`.
    ///
    /// This is how external archive backends plug in. `source` is the identity
    /// later passed to [`unmount`](Self::unmount); it must not collide with an
    /// existing mount.
    pub fn mount_backend(
        &mut self,
        source: impl Into<String>,
        backend: Arc<dyn Backend>,
        mount_point: impl AsRef<Path>,
        append: bool,
    ) -> VfsResult<()> {
        let source = source.into();
        if self.is_mounted(&source) {
            return Err(VfsError::InvalidArgument(format!(
                "already mounted: {source}"
            )));
        }
        let point = normalize(mount_point.as_ref());
        tracing::debug!(source = %source, point = %point.display(), append, "mount");
        let entry = MountEntry {
            source,
            point,
            backend,
        };
        if append {
            self.mounts.push(entry);
        } else {
            self.mounts.insert(0, entry);
        }
        Ok(())
    }

    /// Mount an in-memory blob as a single read-only file named `label`.
    ///
    /// Fails before touching the table if `bytes` is empty (a zero-length
    /// buffer can never represent a mountable image) or if `label` collides
    /// with an existing mount source.
    pub fn mount_memory(
        &mut self,
        bytes: impl Into<Vec<u8>>,
        label: &str,
        mount_point: impl AsRef<Path>,
        append: bool,
    ) -> VfsResult<()> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(VfsError::InvalidArgument(
                "cannot mount a zero-length buffer".into(),
            ));
        }
        let backend = MemBackend::from_blob(label, bytes);
        self.mount_backend(label, Arc::new(backend), mount_point, append)
    }

    /// Mount a fresh writable in-memory tree.
    ///
    /// Useful as an ephemeral scratch area or a write target in tests.
    pub fn mount_scratch(
        &mut self,
        label: &str,
        mount_point: impl AsRef<Path>,
        append: bool,
    ) -> VfsResult<()> {
        self.mount_backend(label, Arc::new(MemBackend::new()), mount_point, append)
    }

    /// Remove the mount registered under `source`.
    ///
    /// Removes exactly one entry. Streams already opened from that backend
    /// stay valid until individually closed; unmount only affects future
    /// resolution.
    pub fn unmount(&mut self, source: &str) -> VfsResult<()> {
        let idx = self
            .mounts
            .iter()
            .position(|m| m.source == source)
            .ok_or_else(|| VfsError::NotFound(format!("not mounted: {source}")))?;
        tracing::debug!(source, "unmount");
        self.mounts.remove(idx);
        Ok(())
    }

    /// Whether `source` is currently mounted.
    pub fn is_mounted(&self, source: &str) -> bool {
        self.mounts.iter().any(|m| m.source == source)
    }

    /// Number of mounted backends.
    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// List all current mounts in table order.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.mounts
            .iter()
            .map(|m| MountInfo {
                source: m.source.clone(),
                point: m.point.clone(),
                read_only: m.backend.read_only(),
            })
            .collect()
    }

    /// Resolve a virtual path to a backend and a backend-relative path.
    ///
    /// Longest matching mount point wins; table order breaks ties. The first
    /// candidate whose backend contains the relative path is returned. No hit
    /// is [`VfsError::NotFound`], never a translated backend error: no backend
    /// was asked to fail.
    pub fn resolve(&self, path: impl AsRef<Path>) -> VfsResult<(Arc<dyn Backend>, PathBuf)> {
        let path = path.as_ref();
        for (backend, relative) in self.candidates(path) {
            if backend.contains(&relative) {
                tracing::trace!(path = %path.display(), rel = %relative.display(), "resolved");
                return Ok((backend, relative));
            }
        }
        Err(VfsError::NotFound(path.display().to_string()))
    }

    /// Whether any mounted backend contains `path`.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).is_ok()
    }

    /// Merged, sorted, de-duplicated entry names under `dir` across all
    /// mounts. Snapshot at call time.
    pub fn enumerate(&self, dir: impl AsRef<Path>) -> Vec<String> {
        let dir = dir.as_ref();
        let mut names = Vec::new();
        for (backend, relative) in self.candidates(dir) {
            if let Ok(list) = backend.enumerate(&relative) {
                names.extend(list);
            }
        }
        names.sort();
        names.dedup();
        names
    }

    /// Open a virtual path for reading.
    pub fn open_read(&self, path: impl AsRef<Path>) -> VfsResult<Stream> {
        let path = path.as_ref();
        let (backend, relative) = self.resolve(path)?;
        let handle = backend
            .open_read(&relative)
            .map_err(|e| VfsError::io("open for read", e))?;
        Ok(Stream::new(handle, StreamMode::Read))
    }

    /// Open a virtual path for writing.
    ///
    /// The write goes to the first writable backend whose mount point matches,
    /// in resolution order; the file need not exist yet. With no writable
    /// candidate the path cannot be created anywhere and the result is
    /// [`VfsError::NotFound`].
    pub fn open_write(&self, path: impl AsRef<Path>) -> VfsResult<Stream> {
        let path = path.as_ref();
        for (backend, relative) in self.candidates(path) {
            if backend.read_only() {
                continue;
            }
            let handle = backend
                .open_write(&relative)
                .map_err(|e| VfsError::io("open for write", e))?;
            return Ok(Stream::new(handle, StreamMode::Write));
        }
        Err(VfsError::NotFound(format!(
            "no writable mount for {}",
            path.display()
        )))
    }

    /// Load the whole contents of a virtual path.
    pub fn load(&self, path: impl AsRef<Path>) -> VfsResult<Vec<u8>> {
        let mut stream = self.open_read(path)?;
        let size = stream.size()?;
        let mut data = vec![0u8; size as usize];
        let n = stream.read(&mut data)?;
        data.truncate(n);
        stream.close()?;
        Ok(data)
    }

    /// Write `data` as the whole contents of a virtual path.
    ///
    /// Returns the number of bytes written. An empty `data` writes an empty
    /// file.
    pub fn store(&self, path: impl AsRef<Path>, data: &[u8]) -> VfsResult<usize> {
        let mut stream = self.open_write(path)?;
        let written = stream.write(data)?;
        stream.close()?;
        Ok(written)
    }

    /// Mount candidates for `path`: longest point first, table order for ties.
    ///
    /// Yields each candidate backend with the path made relative to its mount
    /// point.
    fn candidates(&self, path: &Path) -> impl Iterator<Item = (Arc<dyn Backend>, PathBuf)> + '_ {
        let normalized = normalize(path);
        let mut matching: Vec<&MountEntry> = self
            .mounts
            .iter()
            .filter(|m| m.point.as_os_str().is_empty() || normalized.starts_with(&m.point))
            .collect();
        // Stable sort keeps table order within equal prefix lengths
        matching.sort_by_key(|m| std::cmp::Reverse(m.point.as_os_str().len()));
        matching.into_iter().map(move |m| {
            let relative = if m.point.as_os_str().is_empty() {
                normalized.clone()
            } else {
                normalized
                    .strip_prefix(&m.point)
                    .unwrap_or(&normalized)
                    .to_path_buf()
            };
            (Arc::clone(&m.backend), relative)
        })
    }
}

/// Normalize a virtual path: strip leading separators, resolve `.` and `..`.
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

#[cfg(test)]
mod tests {
    use super::*;

    /// Mount an in-memory tree pre-populated with `files`.
    ///
    /// Files are written through the backend directly so that overlapping
    /// mounts in the table cannot swallow the fixture data.
    fn scratch_with(table: &mut MountTable, label: &str, point: &str, files: &[(&str, &[u8])]) {
        let backend = MemBackend::new();
        for (name, data) in files {
            let mut handle = backend.open_write(Path::new(name)).unwrap();
            handle.write_bytes(data).unwrap();
            handle.close().unwrap();
        }
        table
            .mount_backend(label, Arc::new(backend), point, true)
            .unwrap();
    }

    #[test]
    fn resolve_prefers_longest_prefix() {
        let mut table = MountTable::new();
        scratch_with(&mut table, "outer", "mnt", &[("file.txt", b"outer")]);
        scratch_with(&mut table, "inner", "mnt/project", &[("file.txt", b"inner")]);

        assert_eq!(table.load("mnt/file.txt").unwrap(), b"outer");
        assert_eq!(table.load("mnt/project/file.txt").unwrap(), b"inner");
    }

    #[test]
    fn ties_resolve_in_table_order() {
        let mut table = MountTable::new();
        scratch_with(&mut table, "first", "res", &[("a.txt", b"first")]);
        scratch_with(&mut table, "second", "res", &[("a.txt", b"second"), ("b.txt", b"only")]);

        // Both mounts claim res/a.txt; the earlier one wins
        assert_eq!(table.load("res/a.txt").unwrap(), b"first");
        // res/b.txt only exists in the second mount
        assert_eq!(table.load("res/b.txt").unwrap(), b"only");
    }

    #[test]
    fn prepend_outranks_earlier_mounts() {
        let mut table = MountTable::new();
        scratch_with(&mut table, "base", "res", &[("a.txt", b"base")]);
        table.mount_scratch("patch", "res", false).unwrap();
        // Write through the patch mount by storing while it is frontmost
        table.store("res/a.txt", b"patched").unwrap();

        assert_eq!(table.load("res/a.txt").unwrap(), b"patched");
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut table = MountTable::new();
        scratch_with(&mut table, "m1", "res", &[("x", b"1")]);
        scratch_with(&mut table, "m2", "res", &[("x", b"2")]);
        for _ in 0..10 {
            assert_eq!(table.load("res/x").unwrap(), b"1");
        }
    }

    #[test]
    fn unmount_removes_exactly_one_entry() {
        let mut table = MountTable::new();
        scratch_with(&mut table, "a", "res", &[("f", b"a")]);
        scratch_with(&mut table, "b", "res", &[("f", b"b")]);
        assert_eq!(table.mount_count(), 2);

        table.unmount("a").unwrap();
        assert_eq!(table.mount_count(), 1);
        assert_eq!(table.load("res/f").unwrap(), b"b");

        assert!(matches!(table.unmount("a"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn duplicate_source_is_rejected() {
        let mut table = MountTable::new();
        table.mount_scratch("dup", "a", true).unwrap();
        let err = table.mount_scratch("dup", "b", true).unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument(_)));
        assert_eq!(table.mount_count(), 1);
    }

    #[test]
    fn mount_memory_rejects_empty_buffer() {
        let mut table = MountTable::new();
        let err = table
            .mount_memory(Vec::new(), "empty.bin", "res", true)
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument(_)));
        assert_eq!(table.mount_count(), 0);
    }

    #[test]
    fn mount_memory_exposes_blob_as_file() {
        let mut table = MountTable::new();
        table
            .mount_memory(b"payload".to_vec(), "data.bin", "res", true)
            .unwrap();

        assert!(table.exists("res/data.bin"));
        assert_eq!(table.load("res/data.bin").unwrap(), b"payload");
        // Blob mounts are read-only
        assert!(table.store("res/data.bin", b"nope").is_err());
    }

    #[test]
    fn mount_missing_directory_is_backend_unavailable() {
        let mut table = MountTable::new();
        let err = table.mount("/definitely/not/here", "res", true).unwrap_err();
        assert!(matches!(err, VfsError::BackendUnavailable(_)));
        assert_eq!(table.mount_count(), 0);
    }

    #[test]
    fn resolve_miss_is_not_found() {
        let table = MountTable::new();
        assert!(matches!(
            table.resolve("res/ghost.txt"),
            Err(VfsError::NotFound(_))
        ));
        assert!(!table.exists("res/ghost.txt"));
    }

    #[test]
    fn root_mount_point_variants() {
        for point in ["", "/"] {
            let mut table = MountTable::new();
            scratch_with(&mut table, "root", point, &[("top.txt", b"top")]);
            assert!(table.exists("top.txt"));
            assert!(table.exists("/top.txt"));
            assert_eq!(table.load("top.txt").unwrap(), b"top");
        }
    }

    #[test]
    fn enumerate_merges_and_dedupes() {
        let mut table = MountTable::new();
        scratch_with(&mut table, "m1", "res", &[("a", b"1"), ("both", b"1")]);
        scratch_with(&mut table, "m2", "res", &[("b", b"2"), ("both", b"2")]);

        let names = table.enumerate("res");
        assert_eq!(names, vec!["a".to_string(), "b".to_string(), "both".to_string()]);
    }

    #[test]
    fn roundtrip_various_sizes() {
        let mut table = MountTable::new();
        table.mount_scratch("rw", "out", true).unwrap();

        for n in [0usize, 1, 4096, 1 << 20] {
            let data: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
            assert_eq!(table.store("out/blob.bin", &data).unwrap(), n);
            assert_eq!(table.load("out/blob.bin").unwrap(), data);
        }
    }

    #[test]
    fn open_stream_survives_unmount() {
        let mut table = MountTable::new();
        scratch_with(&mut table, "m", "res", &[("keep.txt", b"still here")]);

        let mut stream = table.open_read("res/keep.txt").unwrap();
        table.unmount("m").unwrap();
        assert!(!table.exists("res/keep.txt"));

        let mut buf = [0u8; 32];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"still here");
        stream.close().unwrap();
    }

    #[test]
    fn store_then_load_empty_file() {
        let mut table = MountTable::new();
        table.mount_scratch("rw", "", true).unwrap();
        assert_eq!(table.store("empty.bin", b"").unwrap(), 0);
        assert!(table.exists("empty.bin"));
        assert_eq!(table.load("empty.bin").unwrap(), b"");
    }

    #[test]
    fn writes_skip_read_only_mounts() {
        let mut table = MountTable::new();
        table
            .mount_memory(b"frozen".to_vec(), "ro.bin", "res", true)
            .unwrap();
        table.mount_scratch("rw", "res", true).unwrap();

        table.store("res/new.txt", b"written").unwrap();
        assert_eq!(table.load("res/new.txt").unwrap(), b"written");
        // The read-only blob is still resolved first for reads
        assert_eq!(table.load("res/ro.bin").unwrap(), b"frozen");
    }
}
