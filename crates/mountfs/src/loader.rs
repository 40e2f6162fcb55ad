//! Loader facade: resolution + stream + a caller-supplied decoder.
//!
//! Format decoders never learn where bytes live. They receive a [`Stream`]
//! and consume it through `std::io::{Read, Seek}`; this module owns the
//! open/close bookkeeping around the decode call.

use crate::error::{VfsError, VfsResult};
use crate::stream::Stream;
use crate::table::MountTable;
use std::io;
use std::path::Path;

/// Open `path` for reading and run `decode` over the stream.
///
/// The stream is closed whether or not the decoder succeeds. Decoder failure
/// surfaces as a `decode` I/O error; the caller can inspect the wrapped
/// `io::Error` for format-specific detail.
///
/// ```no_run
/// use mountfs::{loader, MountTable};
/// use std::io::Read;
///
/// let mut table = MountTable::new();
/// table.mount("assets", "res", true)?;
///
/// // A minimal "decoder": read a four-byte magic number
/// let magic = loader::load_with(&table, "res/img/logo.png", |stream| {
///     let mut magic = [0u8; 4];
///     stream.read_exact(&mut magic)?;
///     Ok(magic)
/// })?;
/// # Ok::<(), mountfs::VfsError>(())
/// ```
pub fn load_with<T, F>(table: &MountTable, path: impl AsRef<Path>, decode: F) -> VfsResult<T>
where
    F: FnOnce(&mut Stream) -> io::Result<T>,
{
    let mut stream = table.open_read(path)?;
    let decoded = decode(&mut stream).map_err(|e| VfsError::io("decode", e));
    // Close regardless of decoder outcome; the decode result takes precedence
    // over a close failure on a read stream
    let _ = stream.close();
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn table_with(path: &str, data: &[u8]) -> MountTable {
        let mut table = MountTable::new();
        table.mount_scratch("fixture", "", true).unwrap();
        table.store(path, data).unwrap();
        table
    }

    /// Stand-in for a format decoder: generic over the stream it reads.
    fn decode_magic_and_tail<R: Read + Seek>(r: &mut R) -> std::io::Result<([u8; 4], [u8; 4])> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        r.seek(SeekFrom::End(-4))?;
        let mut tail = [0u8; 4];
        r.read_exact(&mut tail)?;
        Ok((magic, tail))
    }

    #[test]
    fn decoder_gets_seekable_stream() {
        let table = table_with("img.bin", b"MAGCpayload-tail");

        let (magic, tail) =
            load_with(&table, "img.bin", |stream| decode_magic_and_tail(stream)).unwrap();

        assert_eq!(&magic, b"MAGC");
        assert_eq!(&tail, b"tail");
    }

    #[test]
    fn decoder_error_is_reported_as_decode() {
        let table = table_with("short.bin", b"x");

        let err = load_with(&table, "short.bin", |stream| {
            let mut buf = [0u8; 16];
            stream.read_exact(&mut buf)?;
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(err, VfsError::Io { op: "decode", .. }));
    }

    #[test]
    fn missing_path_fails_before_decoding() {
        let table = MountTable::new();
        let err = load_with(&table, "ghost.bin", |_| Ok(())).unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }
}
