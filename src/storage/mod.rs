//! # Storage Module
//!
//! This module provides the buffered random-access file layer the engine
//! persists table data and indexes through. Every record read or write ends
//! up here, so correctness under partial failure (disk full, I/O errors,
//! short reads) matters more than anything else in this crate.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │   Storage engine (tables, indexes)        │  external
//! ├──────────────────────────────────────────┤
//! │   CachedFile          (file.rs)           │  cursor, size, operation set
//! ├──────────────────────────────────────────┤
//! │   CacheWindow         (cache.rs)          │  refresh / flush policy
//! │   CacheBuffer + MemoryBudget (memory/)    │  fallible buffer reservation
//! ├──────────────────────────────────────────┤
//! │   NativeFile / OsFile (native.rs)         │  positioned byte I/O
//! └──────────────────────────────────────────┘
//! ```
//!
//! Path composition (`location.rs`) and error translation (`error.rs`) are
//! used at every level.
//!
//! ## Copy Semantics
//!
//! Unlike a memory-mapped design, reads copy out of the window into the
//! caller's buffer and writes copy into it. The window is owned by exactly
//! one handle, and `&mut self` on every operation means the borrow checker
//! rules out concurrent use of a handle at compile time.
//!
//! ## Failure Model
//!
//! | Failure                     | Result                                     |
//! |-----------------------------|--------------------------------------------|
//! | OS error on any operation   | `FileError` (kind `Driver`), call aborted  |
//! | Deferred write fails        | reported by the next flush point           |
//! | Cache buffer refused        | handle keeps working without the window    |
//! | Read at end of file         | short count, not an error                  |
//!
//! The layer never retries on its own. A failed flush leaves the dirty bytes
//! in place, so the caller can retry.
//!
//! ## Module Organization
//!
//! - `native`: `NativeFile` trait, `OsFile`, path-level rename/remove
//! - `error`: `FileError` and OS error translation
//! - `location`: `PathResolver` strategies (`DirResolver`, `SlotTable`)
//! - `cache`: `CacheWindow`, `CacheSize`, `IoStats`
//! - `file`: `CachedFile`, the handle
//! - `builder`: `CachedFileBuilder`

mod builder;
mod cache;
mod error;
mod file;
mod location;
mod native;

pub use builder::CachedFileBuilder;
pub use cache::{CacheSize, CacheWindow, IoStats, Refresh};
pub use error::{error_kind, file_error, translate, ErrorKind, FileError, FileOp, IoResultExt};
pub use file::{remove_file, CachedFile};
pub use location::{DirResolver, FileLocation, PathResolver, SlotTable};
pub use native::{remove_path, rename_path, NativeFile, OsFile};
