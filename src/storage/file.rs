//! # Cached File Handle
//!
//! `CachedFile` is the handle the storage engine uses for every table and
//! index file. It owns the native file, the logical size and cursor, and one
//! cache window.
//!
//! ## Operation Set
//!
//! | Operation     | Physical I/O                                    |
//! |---------------|-------------------------------------------------|
//! | `read_bytes`  | none on a hit; one refresh (flush + read) on a miss |
//! | `write_bytes` | none when the window absorbs it                 |
//! | `flush`       | one write of the dirty span, or nothing         |
//! | `grow_to`     | flush, then `set_len`                           |
//! | `rename`      | flush, then an OS rename                        |
//! | `close`       | flush, then finalize and release                |
//! | `remove`      | close, then delete                              |
//! | `set_pos`     | none                                            |
//!
//! ## Size and Position
//!
//! `size` is the logical length. It grows through `grow_to` and through
//! writes that end past it; bytes skipped by such a write read back as zero.
//! The cursor may be placed anywhere, including past `size`. Reads clip to
//! `size`, so a read at or beyond the end returns `0`.
//!
//! ## Oversized Transfers
//!
//! A transfer longer than the cache capacity goes straight to the native
//! file after the window has been flushed. A direct write that lands on the
//! window's region invalidates it, so later hits never serve stale bytes.
//!
//! ## Release
//!
//! `close` and `remove` consume the handle. A handle that is dropped instead
//! flushes on a best-effort basis and logs a warning if that fails; the error
//! cannot be returned from `Drop`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Result;
use log::{debug, trace, warn};

use super::builder::CachedFileBuilder;
use super::cache::{CacheWindow, IoStats, Refresh};
use super::error::{translate, FileOp, IoResultExt};
use super::location::{display_name, FileLocation, PathResolver};
use super::native::{remove_path, rename_path, NativeFile, OsFile};
use super::CacheSize;

#[derive(Debug)]
pub struct CachedFile<F: NativeFile = OsFile> {
    native: F,
    location: FileLocation,
    path: PathBuf,
    file_name: String,
    resolver: Arc<dyn PathResolver>,
    size: u64,
    position: u64,
    window: CacheWindow,
    stats: IoStats,
    released: bool,
}

impl CachedFile<OsFile> {
    pub fn builder() -> CachedFileBuilder {
        CachedFileBuilder::new()
    }

    /// Opens `source_path/name` on the OS file system.
    ///
    /// `cache_size` follows the engine's convention: `-1` for the default
    /// capacity, `0` for no cache, anything else for an explicit capacity.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut file = CachedFile::create("users.db", true, "./data", NO_SLOT, -1)?;
    /// file.write_bytes(b"header")?;
    /// file.close()?;
    /// ```
    pub fn create<P: AsRef<Path>>(
        name: &str,
        is_creation: bool,
        source_path: P,
        slot: i32,
        cache_size: i32,
    ) -> Result<Self> {
        Self::builder()
            .name(name)
            .source_path(source_path)
            .slot(slot)
            .create(is_creation)
            .cache_size(CacheSize::from_raw(cache_size))
            .open()
    }
}

impl<F: NativeFile> CachedFile<F> {
    pub(super) fn from_parts(
        native: F,
        location: FileLocation,
        path: PathBuf,
        resolver: Arc<dyn PathResolver>,
        size: u64,
        window: CacheWindow,
    ) -> Self {
        Self {
            native,
            location,
            file_name: display_name(&path),
            path,
            resolver,
            size,
            position: 0,
            window,
            stats: IoStats::default(),
            released: false,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.location.name
    }

    pub fn location(&self) -> &FileLocation {
        &self.location
    }

    /// Configured window capacity in bytes, `0` for a pass-through handle.
    pub fn cache_capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Whether the cache buffer is currently allocated.
    pub fn is_cached(&self) -> bool {
        self.window.is_active()
    }

    pub fn is_dirty(&self) -> bool {
        self.window.is_dirty()
    }

    /// Byte range of the file currently held by the window.
    pub fn cached_range(&self) -> Option<std::ops::Range<u64>> {
        self.window
            .is_loaded()
            .then(|| self.window.start()..self.window.end())
    }

    pub fn stats(&self) -> IoStats {
        self.stats
    }

    /// Moves the cursor. Performs no I/O and accepts any offset.
    pub fn set_pos(&mut self, pos: u64) {
        self.position = pos;
    }

    /// Reads up to `buf.len()` bytes at the cursor and advances it.
    ///
    /// Returns fewer bytes only at end of file; `0` at or past it.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pos = self.position;
        if buf.is_empty() || pos >= self.size {
            return Ok(0);
        }

        let available = (self.size - pos).min(buf.len() as u64) as usize;
        let out = &mut buf[..available];

        let read = if self.window.contains_read(pos, available) {
            self.stats.cache_hits += 1;
            trace!("cache hit: {} bytes at {} of '{}'", available, pos, self.file_name);
            self.window.read_into(pos, out)
        } else {
            match self.refresh(pos, available)? {
                Refresh::Cached => self.window.read_into(pos, out),
                Refresh::Direct => self.read_direct(pos, out)?,
            }
        };

        self.position += read as u64;
        Ok(read)
    }

    /// Writes `data` at the cursor and advances it.
    ///
    /// Writing past `size` extends it. Failures of deferred writes surface at
    /// the next flush point.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let pos = self.position;
        let count = data.len();
        let end = pos.checked_add(count as u64).ok_or_else(|| {
            let overflow = io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} bytes at offset {} pass the largest file offset", count, pos),
            );
            translate(FileOp::Write, &overflow, &self.file_name)
        })?;

        if self.window.can_absorb_write(pos, count) {
            self.stats.cache_hits += 1;
        } else if self.refresh(pos, count)? == Refresh::Direct {
            self.write_direct(pos, data)?;
            self.advance_past_write(end);
            return Ok(count);
        }

        self.window.write_from(pos, data);
        self.advance_past_write(end);
        Ok(count)
    }

    /// Repositions the window over `[position, position+count)`.
    ///
    /// Reads and writes call this on a miss; calling it directly prefetches.
    pub fn refresh_cache(&mut self, count: usize) -> Result<Refresh> {
        self.refresh(self.position, count)
    }

    /// Writes back the dirty part of the window, if any.
    pub fn flush(&mut self) -> Result<()> {
        self.window
            .flush(&mut self.native, &self.file_name, &mut self.stats)?;
        Ok(())
    }

    /// Flushes, then asks the OS to make the file durable.
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.native.sync().or_file_error(FileOp::Flush, &self.file_name)
    }

    /// Extends the file to `new_size` bytes. New bytes read back as zero.
    ///
    /// A size not larger than the current one is a no-op.
    pub fn grow_to(&mut self, new_size: u64) -> Result<()> {
        if new_size <= self.size {
            return Ok(());
        }

        self.flush()?;
        self.native
            .set_len(new_size)
            .or_file_error(FileOp::Grow, &self.file_name)?;

        debug!(
            "grew '{}' from {} to {} bytes",
            self.file_name, self.size, new_size
        );
        self.size = new_size;
        Ok(())
    }

    /// Renames the backing file, keeping the handle open.
    ///
    /// The new path is resolved with the same resolver the handle was opened
    /// with. An existing file at the target is never replaced.
    pub fn rename<P: AsRef<Path>>(&mut self, new_name: &str, source_path: P, slot: i32) -> Result<()> {
        self.flush()?;

        let location = FileLocation::new(new_name, source_path.as_ref(), slot);
        let new_path = self.resolver.resolve(&location)?;
        rename_path(&self.path, &new_path)?;

        debug!("renamed '{}' to '{}'", self.file_name, new_path.display());
        self.file_name = display_name(&new_path);
        self.path = new_path;
        self.location = location;
        Ok(())
    }

    /// Flushes and releases the handle.
    ///
    /// The native file is released even when this returns an error.
    pub fn close(mut self) -> Result<()> {
        self.released = true;

        let flushed = self.flush();
        let closed = self
            .native
            .close()
            .or_file_error(FileOp::Close, &self.file_name);
        self.window.release();

        flushed?;
        closed?;
        debug!("closed '{}' ({} bytes)", self.file_name, self.size);
        Ok(())
    }

    /// Closes the handle, then deletes its file.
    ///
    /// Nothing is deleted if the close fails.
    pub fn remove(self) -> Result<()> {
        let path = self.path.clone();
        self.close()?;
        remove_path(&path)?;

        debug!("removed '{}'", path.display());
        Ok(())
    }

    fn refresh(&mut self, pos: u64, count: usize) -> Result<Refresh> {
        self.window.refresh(
            &mut self.native,
            pos,
            count,
            &self.file_name,
            &mut self.stats,
        )
    }

    fn read_direct(&mut self, pos: u64, out: &mut [u8]) -> Result<usize> {
        let read = self
            .native
            .read_at(pos, out)
            .or_file_error(FileOp::Read, &self.file_name)?;

        self.stats.physical_reads += 1;
        self.stats.direct_reads += 1;
        Ok(read)
    }

    fn write_direct(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        self.native
            .write_at(pos, data)
            .or_file_error(FileOp::Write, &self.file_name)?;

        self.stats.physical_writes += 1;
        self.stats.direct_writes += 1;

        if self.window.overlaps(pos, data.len()) {
            self.window.invalidate();
        }
        Ok(())
    }

    fn advance_past_write(&mut self, end: u64) {
        self.position = end;
        self.size = self.size.max(end);
    }
}

impl<F: NativeFile> Drop for CachedFile<F> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(e) = self.flush() {
            warn!(
                "dropping '{}' with unflushed data: {:#}",
                self.file_name, e
            );
        }
    }
}

/// Deletes a file that is not open, resolving its path with `resolver`.
pub fn remove_file<P: AsRef<Path>>(
    name: &str,
    source_path: P,
    slot: i32,
    resolver: &dyn PathResolver,
) -> Result<()> {
    let location = FileLocation::new(name, source_path.as_ref(), slot);
    let path = resolver.resolve(&location)?;
    remove_path(&path)
}
