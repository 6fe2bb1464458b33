//! # File Error Translation
//!
//! Every OS-level failure detected by the storage layer is translated here,
//! at the point of detection, into a [`FileError`]. No raw `io::Error` leaves
//! the storage module: callers receive an `eyre::Report` that can be
//! downcast to `FileError` to inspect the kind, the operation, the native
//! error code and the file name.
//!
//! ## Error Kinds
//!
//! | Kind          | Raised by                                      | Fatal to      |
//! |---------------|------------------------------------------------|---------------|
//! | `Driver`      | open, read, write, grow, rename, remove, close | the call only |
//! | `OutOfMemory` | cache buffer reservation                       | nothing       |
//!
//! `OutOfMemory` never aborts a file operation. Creation degrades to an
//! uncached handle and a refresh degrades to direct I/O. The error value
//! still exists so the degradation can be logged and tested.
//!
//! ## Usage
//!
//! ```ignore
//! match file.read_bytes(&mut buf) {
//!     Ok(n) => { /* n < buf.len() only at end of file */ }
//!     Err(report) => {
//!         let err = report.downcast_ref::<FileError>();
//!         // retry, abort the transaction, or propagate
//!     }
//! }
//! ```

use std::fmt;
use std::io;

use eyre::{Report, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Driver,
    OutOfMemory,
}

/// The file operation that was in progress when an error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Open,
    Create,
    Read,
    Write,
    Flush,
    Grow,
    Rename,
    Remove,
    Close,
    Allocate,
}

impl FileOp {
    pub fn name(&self) -> &'static str {
        match self {
            FileOp::Open => "open",
            FileOp::Create => "create",
            FileOp::Read => "read",
            FileOp::Write => "write",
            FileOp::Flush => "flush",
            FileOp::Grow => "grow",
            FileOp::Rename => "rename",
            FileOp::Remove => "remove",
            FileOp::Close => "close",
            FileOp::Allocate => "allocate cache for",
        }
    }
}

#[derive(Debug)]
pub struct FileError {
    pub kind: ErrorKind,
    pub op: FileOp,
    /// Native error code, when the OS reported one.
    pub code: Option<i32>,
    pub file_name: String,
    pub message: String,
}

impl FileError {
    pub fn out_of_memory(file_name: &str, requested: usize, cause: &Report) -> Self {
        Self {
            kind: ErrorKind::OutOfMemory,
            op: FileOp::Allocate,
            code: None,
            file_name: file_name.to_string(),
            message: format!("cannot allocate {} cache bytes: {}", requested, cause),
        }
    }

    pub fn already_exists(op: FileOp, file_name: &str) -> Self {
        Self {
            kind: ErrorKind::Driver,
            op,
            code: None,
            file_name: file_name.to_string(),
            message: describe(io::ErrorKind::AlreadyExists, None).to_string(),
        }
    }

    pub fn is_driver(&self) -> bool {
        self.kind == ErrorKind::Driver
    }

    pub fn is_out_of_memory(&self) -> bool {
        self.kind == ErrorKind::OutOfMemory
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot {} file '{}': {}",
            self.op.name(),
            self.file_name,
            self.message
        )?;
        if let Some(code) = self.code {
            write!(f, " (error {})", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for FileError {}

/// Builds the driver error for a native error code on `file_name`.
///
/// This is the single place native codes are turned into diagnostics.
pub fn file_error(op: FileOp, code: i32, file_name: &str) -> Report {
    let os_error = io::Error::from_raw_os_error(code);
    Report::new(FileError {
        kind: ErrorKind::Driver,
        op,
        code: Some(code),
        file_name: file_name.to_string(),
        message: describe(os_error.kind(), Some(code)).to_string(),
    })
}

/// Translates an `io::Error` raised while performing `op` on `file_name`.
pub fn translate(op: FileOp, err: &io::Error, file_name: &str) -> Report {
    match err.raw_os_error() {
        Some(code) => file_error(op, code, file_name),
        None => Report::new(FileError {
            kind: ErrorKind::Driver,
            op,
            code: None,
            file_name: file_name.to_string(),
            message: format!("{} ({})", describe(err.kind(), None), err),
        }),
    }
}

/// Returns the kind of the `FileError` carried by `report`, if any.
pub fn error_kind(report: &Report) -> Option<ErrorKind> {
    report.downcast_ref::<FileError>().map(|e| e.kind)
}

pub trait IoResultExt<T> {
    fn or_file_error(self, op: FileOp, file_name: &str) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn or_file_error(self, op: FileOp, file_name: &str) -> Result<T> {
        self.map_err(|e| translate(op, &e, file_name))
    }
}

#[cfg(unix)]
const DISK_FULL_CODES: &[i32] = &[28]; // ENOSPC

#[cfg(windows)]
const DISK_FULL_CODES: &[i32] = &[39, 112]; // ERROR_HANDLE_DISK_FULL, ERROR_DISK_FULL

#[cfg(not(any(unix, windows)))]
const DISK_FULL_CODES: &[i32] = &[];

fn describe(kind: io::ErrorKind, code: Option<i32>) -> &'static str {
    if code.is_some_and(|c| DISK_FULL_CODES.contains(&c)) {
        return "disk is full";
    }

    match kind {
        io::ErrorKind::NotFound => "file or directory not found",
        io::ErrorKind::PermissionDenied => "permission denied",
        io::ErrorKind::AlreadyExists => "file already exists",
        io::ErrorKind::UnexpectedEof => "unexpected end of file",
        io::ErrorKind::WriteZero => "device accepted no more bytes",
        io::ErrorKind::InvalidInput => "invalid argument",
        io::ErrorKind::Interrupted => "operation interrupted",
        io::ErrorKind::OutOfMemory => "not enough memory",
        io::ErrorKind::Unsupported => "operation not supported",
        _ => "input/output error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_not_found_is_driver_error_with_file_name() {
        let err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let report = translate(FileOp::Open, &err, "users.db");

        let file_error = report.downcast_ref::<FileError>().unwrap();
        assert_eq!(file_error.kind, ErrorKind::Driver);
        assert_eq!(file_error.op, FileOp::Open);
        assert_eq!(file_error.code, None);
        assert_eq!(file_error.file_name, "users.db");
        assert!(report.to_string().contains("file or directory not found"));
    }

    #[cfg(unix)]
    #[test]
    fn file_error_maps_enospc_to_disk_full() {
        let report = file_error(FileOp::Write, 28, "orders.db");

        let message = report.to_string();
        assert!(message.contains("disk is full"), "got: {}", message);
        assert!(message.contains("orders.db"));
        assert!(message.contains("(error 28)"));
    }

    #[cfg(unix)]
    #[test]
    fn translate_prefers_native_code() {
        let err = io::Error::from_raw_os_error(13); // EACCES
        let report = translate(FileOp::Create, &err, "secret.db");

        let file_error = report.downcast_ref::<FileError>().unwrap();
        assert_eq!(file_error.code, Some(13));
        assert_eq!(file_error.message, "permission denied");
    }

    #[test]
    fn or_file_error_wraps_io_result() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::Other, "boom"));
        let report = result.or_file_error(FileOp::Flush, "t.db").unwrap_err();

        assert_eq!(error_kind(&report), Some(ErrorKind::Driver));
        assert!(report.to_string().starts_with("cannot flush file 't.db'"));
    }

    #[test]
    fn out_of_memory_error_reports_kind() {
        let cause = eyre::eyre!("budget refused");
        let err = FileError::out_of_memory("idx.db", 4096, &cause);

        assert!(err.is_out_of_memory());
        assert!(!err.is_driver());
        assert!(err.to_string().contains("4096"));
    }

    #[test]
    fn error_kind_is_none_for_foreign_reports() {
        let report = eyre::eyre!("not a file error");
        assert_eq!(error_kind(&report), None);
    }
}
