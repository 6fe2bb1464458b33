//! # cachedfile - Buffered Random-Access Files for Embedded Storage
//!
//! `cachedfile` is the file layer under an embedded relational database: an
//! explicit read-ahead/write-behind cache over raw file I/O, with explicit
//! file growth, cursor tracking and translation of OS errors into typed
//! engine errors. It prioritizes:
//!
//! - **Few physical I/O calls**: one cache window per file absorbs the small,
//!   mostly sequential record accesses of table scans and index lookups
//! - **No lost writes**: a failed flush keeps the dirty bytes for a retry,
//!   and deferred failures surface at the next flush point
//! - **Bounded memory**: cache windows are charged to a shared budget and a
//!   refused reservation degrades to uncached I/O instead of failing
//!
//! ## Quick Start
//!
//! ```ignore
//! use cachedfile::{CachedFile, NO_SLOT};
//!
//! let mut file = CachedFile::create("users.db", true, "./data", NO_SLOT, -1)?;
//!
//! file.grow_to(16 * 1024)?;
//! file.set_pos(4096);
//! file.write_bytes(b"record")?;
//!
//! file.set_pos(4096);
//! let mut buf = [0u8; 6];
//! let n = file.read_bytes(&mut buf)?;
//!
//! file.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Storage engine (external)          │
//! ├─────────────────────────────────────┤
//! │   CachedFile / CachedFileBuilder     │
//! ├─────────────────────────────────────┤
//! │   CacheWindow  │  MemoryBudget       │
//! ├─────────────────────────────────────┤
//! │   NativeFile (OsFile)                │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the file handle, cache window, native I/O and path resolution
//! - [`memory`]: memory budget and the fallible cache buffer
//! - [`config`]: cache and budget constants
//!
//! ## Logging
//!
//! The crate logs through the `log` facade and installs no logger. Refreshes,
//! grows and renames are logged at `debug`, cache hits at `trace`, degraded
//! cache allocation and failed drop-time flushes at `warn`.

pub mod config;
pub mod memory;
pub mod storage;

pub use config::{DEFAULT_CACHE_SIZE, MAX_CACHE_SIZE, MIN_CACHE_SIZE, NO_SLOT};
pub use memory::MemoryBudget;
pub use storage::{
    remove_file, CacheSize, CachedFile, CachedFileBuilder, DirResolver, ErrorKind, FileError,
    FileLocation, FileOp, IoStats, NativeFile, OsFile, PathResolver, SlotTable,
};
