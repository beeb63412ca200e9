//! Positioned reads over an opened database file.
//!
//! The driver never uses a shared file cursor: every read names its absolute
//! byte position, so interleaved reads from different layers (pages, objects,
//! blobs) cannot disturb each other. The file size is captured once at open
//! time; database files do not change size under a reader.
//!
//! Errors stay as [`std::io::Error`] here. Callers decide whether that turns
//! into the typed [`OpenError`](crate::OpenError) (during open) or an
//! [`eyre::Report`] (everywhere else).

use std::fs::File;
use std::io;
use std::path::Path;

#[derive(Debug)]
pub struct DbFile {
    file: File,
    size: u64,
}

impl DbFile {
    /// Opens the file read-only and records its size.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        Ok(Self { file, size })
    }

    /// Size of the file in bytes, as observed at open time.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Fills `buf` from the absolute byte position `pos`. Short reads are an
    /// error: the caller always knows exactly how many bytes must exist.
    #[cfg(unix)]
    pub fn read_exact_at(&self, buf: &mut [u8], pos: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;

        self.file.read_exact_at(buf, pos)
    }

    /// Fills `buf` from the absolute byte position `pos`. Short reads are an
    /// error: the caller always knows exactly how many bytes must exist.
    #[cfg(windows)]
    pub fn read_exact_at(&self, mut buf: &mut [u8], mut pos: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.file.seek_read(buf, pos) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ));
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    pos += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
