//! # Cache Window
//!
//! This module implements the read-ahead/write-behind cache embedded in every
//! `CachedFile`: one contiguous window of the file held in memory, plus the
//! refresh and flush policy that moves it.
//!
//! ## Why One Window?
//!
//! The engine reads and writes records, which are small and mostly
//! sequential. Each physical I/O call has a fixed cost that dwarfs copying a
//! few hundred bytes. Serving neighbouring record accesses from one window
//! amortizes that cost, and the single dirty window bounds data loss to at
//! most one window of unflushed writes.
//!
//! ## Window Layout
//!
//! ```text
//! file:   |------------------------- size -------------------------|
//!                 start                 start+len      start+capacity
//!                   |<------ len ---------->|                |
//!                   |   [dirty.start, dirty.end)             |
//!                   |<------------- capacity --------------->|
//! ```
//!
//! - `len` bytes starting at `start` mirror the file (or its pending state)
//! - `dirty` is the span not yet written back, relative to `start`
//! - bytes in `[start+len, start+capacity)` are not cached. On disk they
//!   are either past end of file or zeros produced by a grow, so a write
//!   landing there zero-fills the gap in the buffer instead of reading
//!
//! ## Refresh Policy
//!
//! 1. Flush a dirty window first; a refresh never discards writes
//! 2. Requests larger than the capacity bypass the window (direct I/O)
//! 3. The new window starts at the position rounded down to
//!    `CACHE_ALIGNMENT` when the rounded window still covers the request,
//!    otherwise exactly at the position
//! 4. One physical read fills it; a short read at end of file only makes
//!    `len` smaller
//!
//! A read failure leaves the window empty, never half-filled.
//!
//! ## Flush Policy
//!
//! A clean window flushes as a no-op. A dirty one is written back with one
//! physical write of the dirty span. If that write fails the window stays
//! dirty with its bytes untouched, so a retry writes the same data.
//!
//! ## Out of Memory
//!
//! A window whose buffer could not be reserved is *inactive*: every refresh
//! retries the reservation and answers `Refresh::Direct` while it keeps
//! failing. The caller then performs direct I/O for that one call.

use std::ops::Range;
use std::sync::Arc;

use eyre::Result;
use log::{debug, trace};

use super::error::{FileError, FileOp, IoResultExt};
use super::native::NativeFile;
use crate::config::{CACHE_ALIGNMENT, DEFAULT_CACHE_SIZE, MAX_CACHE_SIZE, MIN_CACHE_SIZE};
use crate::memory::{CacheBuffer, MemoryBudget};

/// Requested cache capacity for a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheSize {
    /// `DEFAULT_CACHE_SIZE`.
    #[default]
    Default,
    /// An explicit capacity, clamped to `[MIN_CACHE_SIZE, MAX_CACHE_SIZE]`.
    Bytes(usize),
    /// No cache; every transfer is a physical I/O.
    PassThrough,
}

impl CacheSize {
    /// Interprets the engine's integer convention: `-1` (or any negative)
    /// means default, `0` disables the cache, anything else is a byte count.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            r if r < 0 => CacheSize::Default,
            0 => CacheSize::PassThrough,
            r => CacheSize::Bytes(r as usize),
        }
    }

    pub fn capacity(self) -> usize {
        match self {
            CacheSize::Default => DEFAULT_CACHE_SIZE,
            CacheSize::Bytes(n) => n.clamp(MIN_CACHE_SIZE, MAX_CACHE_SIZE),
            CacheSize::PassThrough => 0,
        }
    }
}

/// Physical I/O counters for one handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    pub physical_reads: u64,
    pub physical_writes: u64,
    pub refreshes: u64,
    pub flushes: u64,
    pub cache_hits: u64,
    pub direct_reads: u64,
    pub direct_writes: u64,
}

/// Outcome of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The window now starts at or before the position and covers the request.
    Cached,
    /// The request must go straight to the native file.
    Direct,
}

#[derive(Debug)]
pub struct CacheWindow {
    buffer: CacheBuffer,
    capacity: usize,
    start: u64,
    len: usize,
    loaded: bool,
    dirty: Option<Range<usize>>,
}

impl CacheWindow {
    pub fn new(capacity: usize, budget: Option<Arc<MemoryBudget>>) -> Self {
        Self {
            buffer: CacheBuffer::new(budget),
            capacity,
            start: 0,
            len: 0,
            loaded: false,
            dirty: None,
        }
    }

    /// Reserves the buffer for the configured capacity.
    ///
    /// Fails with an out-of-memory `FileError`; the window stays usable but
    /// inactive.
    pub fn activate(&mut self, file_name: &str) -> Result<()> {
        if self.capacity == 0 || self.is_active() {
            return Ok(());
        }

        self.buffer
            .reserve(self.capacity)
            .map_err(|cause| FileError::out_of_memory(file_name, self.capacity, &cause).into())
    }

    pub fn is_active(&self) -> bool {
        self.capacity > 0 && self.buffer.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> u64 {
        self.start + self.len as u64
    }

    fn owned_end(&self) -> u64 {
        end_of(self.start, self.capacity)
    }

    /// True once a refresh has placed the window over the file.
    pub fn is_loaded(&self) -> bool {
        self.loaded && self.is_active()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn dirty_span(&self) -> Option<Range<u64>> {
        self.dirty
            .as_ref()
            .map(|d| self.start + d.start as u64..self.start + d.end as u64)
    }

    /// True when `[pos, pos+count)` can be copied out without I/O.
    pub fn contains_read(&self, pos: u64, count: usize) -> bool {
        self.is_loaded() && pos >= self.start && end_of(pos, count) <= self.end()
    }

    /// True when `[pos, pos+count)` fits inside the window's capacity.
    pub fn can_absorb_write(&self, pos: u64, count: usize) -> bool {
        self.is_loaded()
            && pos >= self.start
            && end_of(pos, count) <= self.owned_end()
    }

    /// True when `[pos, pos+count)` intersects the region the window owns.
    pub fn overlaps(&self, pos: u64, count: usize) -> bool {
        if !self.loaded {
            return false;
        }
        pos < self.owned_end() && end_of(pos, count) > self.start
    }

    /// Copies cached bytes at `pos` into `out`, returning how many were copied.
    pub fn read_into(&self, pos: u64, out: &mut [u8]) -> usize {
        if !self.is_loaded() || pos < self.start || pos >= self.end() {
            return 0;
        }

        let offset = (pos - self.start) as usize;
        let n = out.len().min(self.len - offset);
        out[..n].copy_from_slice(&self.buffer.as_slice()[offset..offset + n]);
        n
    }

    /// Copies `data` into the window at `pos` and marks it dirty.
    ///
    /// The caller must have checked `can_absorb_write`. A gap between the
    /// cached bytes and `pos` is zero-filled and becomes part of the dirty span.
    pub fn write_from(&mut self, pos: u64, data: &[u8]) {
        debug_assert!(self.can_absorb_write(pos, data.len()));

        let offset = (pos - self.start) as usize;
        let end = offset + data.len();
        let buf = self.buffer.as_mut_slice();

        let dirty_from = if offset > self.len {
            buf[self.len..offset].fill(0);
            self.len
        } else {
            offset
        };

        buf[offset..end].copy_from_slice(data);
        self.len = self.len.max(end);

        self.dirty = Some(match self.dirty.take() {
            Some(d) => d.start.min(dirty_from)..d.end.max(end),
            None => dirty_from..end,
        });
    }

    /// Forgets the cached bytes. The window must be clean.
    pub fn invalidate(&mut self) {
        debug_assert!(!self.is_dirty(), "invalidating a dirty cache window");
        self.start = 0;
        self.len = 0;
        self.loaded = false;
    }

    /// Writes the dirty span back with one physical write.
    ///
    /// Returns whether a write was issued. On failure the window keeps its
    /// dirty span and contents.
    pub fn flush<F: NativeFile>(
        &mut self,
        native: &mut F,
        file_name: &str,
        stats: &mut IoStats,
    ) -> Result<bool> {
        let Some(dirty) = self.dirty.clone() else {
            return Ok(false);
        };

        let offset = self.start + dirty.start as u64;
        native
            .write_at(offset, &self.buffer.as_slice()[dirty.clone()])
            .or_file_error(FileOp::Flush, file_name)?;

        stats.physical_writes += 1;
        stats.flushes += 1;
        self.dirty = None;

        trace!(
            "flushed {} bytes at offset {} of '{}'",
            dirty.len(),
            offset,
            file_name
        );
        Ok(true)
    }

    /// Moves the window so that it covers `[pos, pos+count)`.
    pub fn refresh<F: NativeFile>(
        &mut self,
        native: &mut F,
        pos: u64,
        count: usize,
        file_name: &str,
        stats: &mut IoStats,
    ) -> Result<Refresh> {
        self.flush(native, file_name, stats)?;

        if self.capacity == 0 || count > self.capacity {
            return Ok(Refresh::Direct);
        }

        if let Err(e) = self.activate(file_name) {
            debug!("direct I/O for '{}': {}", file_name, e);
            return Ok(Refresh::Direct);
        }

        let start = window_start(pos, count, self.capacity);
        self.invalidate();

        let capacity = self.capacity;
        let read = native
            .read_at(start, &mut self.buffer.as_mut_slice()[..capacity])
            .or_file_error(FileOp::Read, file_name)?;

        stats.physical_reads += 1;
        stats.refreshes += 1;
        self.start = start;
        self.len = read;
        self.loaded = true;

        debug!(
            "refreshed '{}' window to [{}, {})",
            file_name,
            start,
            start + read as u64
        );
        Ok(Refresh::Cached)
    }

    /// Drops the buffer, returning its memory to the budget.
    pub fn release(&mut self) {
        self.start = 0;
        self.len = 0;
        self.loaded = false;
        self.dirty = None;
        self.buffer.release();
    }
}

/// End of `[pos, pos+count)`, saturating at the largest offset.
fn end_of(pos: u64, count: usize) -> u64 {
    pos.saturating_add(count as u64)
}

fn window_start(pos: u64, count: usize, capacity: usize) -> u64 {
    let aligned = pos - pos % CACHE_ALIGNMENT;
    if end_of(pos, count) <= end_of(aligned, capacity) {
        aligned
    } else {
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Default)]
    struct MemFile {
        data: Vec<u8>,
        fail_writes: bool,
        fail_reads: bool,
        writes: Vec<(u64, usize)>,
    }

    impl NativeFile for MemFile {
        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            if self.fail_reads {
                return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
            }
            let offset = offset as usize;
            if offset >= self.data.len() {
                return Ok(0);
            }
            let n = buf.len().min(self.data.len() - offset);
            buf[..n].copy_from_slice(&self.data[offset..offset + n]);
            Ok(n)
        }

        fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
            }
            let offset = offset as usize;
            if self.data.len() < offset + data.len() {
                self.data.resize(offset + data.len(), 0);
            }
            self.data[offset..offset + data.len()].copy_from_slice(data);
            self.writes.push((offset as u64, data.len()));
            Ok(())
        }

        fn size(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn set_len(&mut self, size: u64) -> io::Result<()> {
            self.data.resize(size as usize, 0);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn mem_file(len: usize) -> MemFile {
        MemFile {
            data: (0..len).map(|i| (i % 251) as u8).collect(),
            ..Default::default()
        }
    }

    fn active_window(capacity: usize) -> CacheWindow {
        let mut window = CacheWindow::new(capacity, None);
        window.activate("test.db").unwrap();
        window
    }

    #[test]
    fn cache_size_from_raw_follows_engine_convention() {
        assert_eq!(CacheSize::from_raw(-1), CacheSize::Default);
        assert_eq!(CacheSize::from_raw(0), CacheSize::PassThrough);
        assert_eq!(CacheSize::from_raw(2048), CacheSize::Bytes(2048));
    }

    #[test]
    fn cache_size_capacity_enforces_floor_and_ceiling() {
        assert_eq!(CacheSize::Default.capacity(), DEFAULT_CACHE_SIZE);
        assert_eq!(CacheSize::Bytes(1).capacity(), MIN_CACHE_SIZE);
        assert_eq!(CacheSize::Bytes(usize::MAX).capacity(), MAX_CACHE_SIZE);
        assert_eq!(CacheSize::Bytes(3000).capacity(), 3000);
        assert_eq!(CacheSize::PassThrough.capacity(), 0);
    }

    #[test]
    fn window_start_aligns_down_when_request_still_fits() {
        assert_eq!(window_start(4090, 8, 4096), 3584);
        assert_eq!(window_start(512, 100, 4096), 512);
        assert_eq!(window_start(1000, 4096, 4096), 1000);
    }

    #[test]
    fn range_checks_saturate_near_largest_offset() {
        let window = active_window(4096);

        assert_eq!(window_start(u64::MAX - 2, 8, 4096), u64::MAX - 511);
        assert!(!window.contains_read(u64::MAX - 2, 8));
        assert!(!window.can_absorb_write(u64::MAX - 2, 8));
        assert!(!window.overlaps(u64::MAX - 2, 8));
    }

    #[test]
    fn refresh_reads_one_window_and_serves_hits() {
        let mut file = mem_file(10_000);
        let mut window = active_window(4096);
        let mut stats = IoStats::default();

        let outcome = window.refresh(&mut file, 4090, 8, "t", &mut stats).unwrap();

        assert_eq!(outcome, Refresh::Cached);
        assert_eq!(window.start(), 3584);
        assert_eq!(window.len(), 4096);
        assert!(window.contains_read(4090, 8));
        assert_eq!(stats.physical_reads, 1);

        let mut out = [0u8; 8];
        assert_eq!(window.read_into(4090, &mut out), 8);
        assert_eq!(out.to_vec(), file.data[4090..4098].to_vec());
    }

    #[test]
    fn refresh_at_end_of_file_shortens_window() {
        let mut file = mem_file(1000);
        let mut window = active_window(4096);
        let mut stats = IoStats::default();

        window.refresh(&mut file, 900, 200, "t", &mut stats).unwrap();

        assert_eq!(window.start(), 512);
        assert_eq!(window.len(), 488);
        assert!(!window.contains_read(900, 200));
        assert!(window.contains_read(900, 100));
    }

    #[test]
    fn refresh_bypasses_cache_for_oversized_requests() {
        let mut file = mem_file(10_000);
        let mut window = active_window(512);
        let mut stats = IoStats::default();

        let outcome = window.refresh(&mut file, 0, 513, "t", &mut stats).unwrap();

        assert_eq!(outcome, Refresh::Direct);
        assert_eq!(stats.physical_reads, 0);
    }

    #[test]
    fn refresh_flushes_dirty_window_first() {
        let mut file = mem_file(8192);
        let mut window = active_window(4096);
        let mut stats = IoStats::default();

        window.refresh(&mut file, 0, 4, "t", &mut stats).unwrap();
        window.write_from(0, b"abcd");
        window.refresh(&mut file, 6000, 4, "t", &mut stats).unwrap();

        assert_eq!(&file.data[..4], b"abcd");
        assert!(!window.is_dirty());
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.refreshes, 2);
    }

    #[test]
    fn refresh_failure_leaves_window_empty() {
        let mut file = mem_file(8192);
        let mut window = active_window(4096);
        let mut stats = IoStats::default();

        window.refresh(&mut file, 0, 4, "t", &mut stats).unwrap();
        file.fail_reads = true;

        assert!(window.refresh(&mut file, 5000, 4, "t", &mut stats).is_err());
        assert!(window.is_empty());
        assert!(!window.contains_read(0, 4));
    }

    #[test]
    fn flush_writes_only_dirty_span() {
        let mut file = mem_file(8192);
        let mut window = active_window(4096);
        let mut stats = IoStats::default();

        window.refresh(&mut file, 0, 1, "t", &mut stats).unwrap();
        window.write_from(100, b"xy");
        window.write_from(10, b"z");

        assert_eq!(window.dirty_span(), Some(10..102));
        assert!(window.flush(&mut file, "t", &mut stats).unwrap());
        assert_eq!(file.writes, vec![(10, 92)]);
    }

    #[test]
    fn flush_of_clean_window_is_noop() {
        let mut file = mem_file(100);
        let mut window = active_window(512);
        let mut stats = IoStats::default();

        assert!(!window.flush(&mut file, "t", &mut stats).unwrap());
        assert_eq!(stats.physical_writes, 0);
    }

    #[test]
    fn failed_flush_keeps_window_dirty() {
        let mut file = mem_file(100);
        let mut window = active_window(512);
        let mut stats = IoStats::default();

        window.refresh(&mut file, 0, 1, "t", &mut stats).unwrap();
        window.write_from(0, b"keep");
        file.fail_writes = true;

        assert!(window.flush(&mut file, "t", &mut stats).is_err());
        assert!(window.is_dirty());
        assert_eq!(stats.physical_writes, 0);

        file.fail_writes = false;
        assert!(window.flush(&mut file, "t", &mut stats).unwrap());
        assert_eq!(&file.data[..4], b"keep");
    }

    #[test]
    fn write_into_gap_zero_fills_and_marks_gap_dirty() {
        let mut file = mem_file(10);
        let mut window = active_window(512);
        let mut stats = IoStats::default();

        window.refresh(&mut file, 0, 1, "t", &mut stats).unwrap();
        assert_eq!(window.len(), 10);

        window.write_from(20, b"!");
        assert_eq!(window.len(), 21);
        assert_eq!(window.dirty_span(), Some(10..21));

        let mut out = [0xFFu8; 11];
        assert_eq!(window.read_into(10, &mut out), 11);
        assert_eq!(&out[..10], &[0u8; 10]);
        assert_eq!(out[10], b'!');
    }

    #[test]
    fn inactive_window_answers_direct() {
        let mut file = mem_file(100);
        let mut window = CacheWindow::new(0, None);
        let mut stats = IoStats::default();

        assert!(!window.is_active());
        assert!(!window.can_absorb_write(0, 1));
        assert!(!window.is_loaded());
        assert_eq!(
            window.refresh(&mut file, 0, 1, "t", &mut stats).unwrap(),
            Refresh::Direct
        );
    }

    #[test]
    fn unloaded_window_absorbs_nothing() {
        let window = active_window(4096);

        assert!(window.is_active());
        assert!(!window.is_loaded());
        assert!(!window.can_absorb_write(0, 8));
        assert!(!window.contains_read(0, 0));
    }

    #[test]
    fn overlaps_uses_full_capacity() {
        let mut file = mem_file(10);
        let mut window = active_window(512);
        let mut stats = IoStats::default();
        window.refresh(&mut file, 0, 1, "t", &mut stats).unwrap();

        assert!(window.overlaps(400, 1000));
        assert!(!window.overlaps(512, 1000));
    }
}
