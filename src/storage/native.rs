//! # Native File Primitives
//!
//! This module provides the `NativeFile` trait, the byte-level abstraction the
//! cache sits on, and `OsFile`, its implementation over `std::fs::File`.
//!
//! ## Copy-Based Positioned Interface
//!
//! ```text
//! fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
//! fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;
//! ```
//!
//! Every physical transfer names its offset explicitly. The native layer has
//! no notion of a cursor; the logical position lives in `CachedFile`.
//!
//! `read_at` keeps reading until the buffer is full or the file ends, so a
//! short count means end of file and nothing else. `write_at` either writes
//! every byte or fails.
//!
//! ## Error Codes
//!
//! Implementations return plain `io::Error`s. Translation into `FileError`
//! happens in the caller, where the file name and operation are known.
//!
//! ## Path Operations
//!
//! Rename and delete act on paths rather than open files and are provided as
//! free functions (`rename_path`, `remove_path`) that translate their errors.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::Result;

use super::error::{FileError, FileOp, IoResultExt};

/// Positioned byte I/O over one open native file.
pub trait NativeFile: Send {
    /// Reads into `buf` starting at `offset`, returning the bytes read.
    ///
    /// Fewer than `buf.len()` bytes are returned only at end of file.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `data` at `offset`, extending the file if needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Returns the current on-disk length.
    fn size(&self) -> io::Result<u64>;

    /// Truncates or extends the file. Extended bytes read back as zero.
    fn set_len(&mut self, size: u64) -> io::Result<()>;

    /// Flushes OS buffers for this file to durable storage.
    fn sync(&mut self) -> io::Result<()>;

    /// Finalizes the file before its descriptor is released.
    ///
    /// The descriptor itself is released when the value is dropped, whether
    /// or not this returns an error.
    fn close(&mut self) -> io::Result<()> {
        self.sync()
    }
}

#[derive(Debug)]
pub struct OsFile {
    file: File,
}

impl OsFile {
    /// Opens `path` for reading and writing, creating it when `create` is set.
    ///
    /// Existing content is never truncated.
    pub fn open(path: &Path, create: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)?;

        Ok(Self { file })
    }
}

impl NativeFile for OsFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(filled)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.file.set_len(size)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// Renames `from` to `to`, refusing to replace an existing file.
pub fn rename_path(from: &Path, to: &Path) -> Result<()> {
    let target = to.display().to_string();

    if to.exists() {
        return Err(FileError::already_exists(FileOp::Rename, &target).into());
    }

    fs::rename(from, to).or_file_error(FileOp::Rename, &from.display().to_string())
}

pub fn remove_path(path: &Path) -> Result<()> {
    fs::remove_file(path).or_file_error(FileOp::Remove, &path.display().to_string())
}
