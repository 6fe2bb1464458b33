//! # Cached File Builder
//!
//! `CachedFileBuilder` configures and opens a [`CachedFile`]. It is the
//! runtime counterpart of the constants in `config`: everything a caller may
//! tune per file is set here.
//!
//! ## Configuration Options
//!
//! | Option        | Default               | Description                          |
//! |---------------|-----------------------|--------------------------------------|
//! | name          | required              | File name, no path separators        |
//! | source_path   | `.`                   | Directory (or volume-relative path)  |
//! | slot          | `NO_SLOT`             | Volume index for `SlotTable`         |
//! | create        | `false`               | Create the file when missing         |
//! | cache_size    | `CacheSize::Default`  | Window capacity                      |
//! | budget        | none                  | Memory budget charged for the window |
//! | resolver      | `DirResolver`         | Strategy turning the above into a path |
//!
//! ## Degraded Opening
//!
//! A failure to open the native file fails `open`. A failure to reserve the
//! cache window does not: the handle opens in pass-through mode, a warning is
//! logged, and every later refresh retries the reservation.
//!
//! ## Usage
//!
//! ```ignore
//! let budget = Arc::new(MemoryBudget::auto_detect());
//! let volumes = Arc::new(SlotTable::new());
//! volumes.mount(0, "/media/card0")?;
//!
//! let file = CachedFile::builder()
//!     .name("orders.db")
//!     .source_path("app/data")
//!     .slot(0)
//!     .create(true)
//!     .cache_size(CacheSize::Bytes(16 * 1024))
//!     .budget(budget)
//!     .resolver(volumes)
//!     .open()?;
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{eyre, Result};
use log::{debug, warn};

use super::cache::{CacheSize, CacheWindow};
use super::error::{FileOp, IoResultExt};
use super::file::CachedFile;
use super::location::{display_name, DirResolver, FileLocation, PathResolver};
use super::native::{NativeFile, OsFile};
use crate::config::NO_SLOT;
use crate::memory::MemoryBudget;

/// Builder for opening a `CachedFile`.
///
/// Use `CachedFile::builder()` to create one, chain the settings, then call
/// `open()`.
pub struct CachedFileBuilder {
    name: Option<String>,
    source_path: PathBuf,
    slot: i32,
    create: bool,
    cache_size: CacheSize,
    budget: Option<Arc<MemoryBudget>>,
    resolver: Option<Arc<dyn PathResolver>>,
}

impl Default for CachedFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CachedFileBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            source_path: PathBuf::from("."),
            slot: NO_SLOT,
            create: false,
            cache_size: CacheSize::Default,
            budget: None,
            resolver: None,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn source_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_path = path.as_ref().to_path_buf();
        self
    }

    /// Sets the volume slot. Only meaningful with a `SlotTable` resolver.
    pub fn slot(mut self, slot: i32) -> Self {
        self.slot = slot;
        self
    }

    /// Creates the file when it does not exist. An existing file is opened
    /// with its content intact.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn cache_size(mut self, size: CacheSize) -> Self {
        self.cache_size = size;
        self
    }

    /// Charges the cache window to `budget`.
    ///
    /// Several handles can share one budget to cap the memory held by all
    /// their windows together.
    pub fn budget(mut self, budget: Arc<MemoryBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Opens the file on the OS file system.
    pub fn open(self) -> Result<CachedFile<OsFile>> {
        self.open_with(OsFile::open)
    }

    /// Opens the file through `opener`, which receives the resolved path and
    /// the creation flag.
    pub fn open_with<F, O>(self, opener: O) -> Result<CachedFile<F>>
    where
        F: NativeFile,
        O: FnOnce(&Path, bool) -> io::Result<F>,
    {
        let name = self
            .name
            .ok_or_else(|| eyre!("cannot open a cached file without a name"))?;

        let resolver: Arc<dyn PathResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(DirResolver),
        };
        let location = FileLocation::new(name, self.source_path, self.slot);
        let path = resolver.resolve(&location)?;
        let file_name = display_name(&path);

        let op = if self.create {
            FileOp::Create
        } else {
            FileOp::Open
        };
        let native = opener(&path, self.create).or_file_error(op, &file_name)?;
        let size = native.size().or_file_error(op, &file_name)?;

        let mut window = CacheWindow::new(self.cache_size.capacity(), self.budget);
        if let Err(e) = window.activate(&file_name) {
            warn!("{:#}; continuing without cache", e);
        }

        debug!(
            "opened '{}' ({} bytes, {} byte cache)",
            file_name,
            size,
            window.capacity()
        );

        Ok(CachedFile::from_parts(
            native, location, path, resolver, size, window,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::{ErrorKind, FileError};
    use crate::storage::location::SlotTable;
    use tempfile::tempdir;

    #[test]
    fn open_requires_name() {
        let err = CachedFileBuilder::new().open().unwrap_err();
        assert!(err.to_string().contains("without a name"));
    }

    #[test]
    fn open_missing_file_without_create_is_driver_error() {
        let dir = tempdir().unwrap();

        let err = CachedFile::builder()
            .name("missing.db")
            .source_path(dir.path())
            .open()
            .unwrap_err();

        let file_error = err.downcast_ref::<FileError>().unwrap();
        assert_eq!(file_error.kind, ErrorKind::Driver);
        assert_eq!(file_error.op, FileOp::Open);
        assert!(file_error.file_name.ends_with("missing.db"));
    }

    #[test]
    fn open_with_create_makes_empty_file() {
        let dir = tempdir().unwrap();

        let file = CachedFile::builder()
            .name("new.db")
            .source_path(dir.path())
            .create(true)
            .open()
            .unwrap();

        assert_eq!(file.size(), 0);
        assert_eq!(file.cache_capacity(), crate::config::DEFAULT_CACHE_SIZE);
        assert!(dir.path().join("new.db").exists());
        file.close().unwrap();
    }

    #[test]
    fn open_resolves_through_slot_table() {
        let volume = tempdir().unwrap();
        std::fs::create_dir_all(volume.path().join("app")).unwrap();

        let table = Arc::new(SlotTable::new());
        table.mount(2, volume.path()).unwrap();

        let file = CachedFile::builder()
            .name("vol.db")
            .source_path("app")
            .slot(2)
            .create(true)
            .resolver(table)
            .open()
            .unwrap();

        assert_eq!(file.path(), volume.path().join("app").join("vol.db"));
        assert_eq!(file.location().slot, 2);
        file.close().unwrap();
    }

    #[test]
    fn open_passes_creation_flag_to_opener() {
        let mut seen = None;

        let result = CachedFileBuilder::new()
            .name("flag.db")
            .create(true)
            .open_with(|path: &Path, create| -> io::Result<OsFile> {
                seen = Some((path.to_path_buf(), create));
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
            });

        let err = result.unwrap_err();
        assert_eq!(err.downcast_ref::<FileError>().unwrap().op, FileOp::Create);
        assert_eq!(seen, Some((PathBuf::from("./flag.db"), true)));
    }
}
