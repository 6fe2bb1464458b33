//! # Cache Buffer
//!
//! Owned, explicitly resizable byte buffer backing a file's cache window.
//!
//! ## Reservation
//!
//! All growth goes through [`CacheBuffer::reserve`], used both when a handle
//! is created and when a pass-through handle retries at refresh time. The
//! reservation is two-phase:
//!
//! 1. Charge the bytes to `Pool::Cache` of the memory budget, if any
//! 2. Grow the vector with `try_reserve_exact`, so allocator failure is an
//!    error value instead of an abort
//!
//! If phase 2 fails the budget charge from phase 1 is returned. The buffer is
//! never left half-grown.
//!
//! ## Capacity vs Length
//!
//! The buffer is zero-initialized up to its reserved size, so the whole
//! reserved region is addressable. How many of those bytes mirror the file is
//! tracked by the cache window, not here.

use std::sync::Arc;

use eyre::{eyre, Result};

use super::{MemoryBudget, Pool};

#[derive(Debug, Default)]
pub struct CacheBuffer {
    data: Vec<u8>,
    budget: Option<Arc<MemoryBudget>>,
}

impl CacheBuffer {
    pub fn new(budget: Option<Arc<MemoryBudget>>) -> Self {
        Self {
            data: Vec::new(),
            budget,
        }
    }

    /// Grows the buffer to at least `bytes`. Never shrinks.
    pub fn reserve(&mut self, bytes: usize) -> Result<()> {
        let current = self.data.len();
        if bytes <= current {
            return Ok(());
        }

        let extra = bytes - current;

        if let Some(budget) = &self.budget {
            budget.allocate(Pool::Cache, extra)?;
        }

        if let Err(e) = self.data.try_reserve_exact(extra) {
            if let Some(budget) = &self.budget {
                budget.release(Pool::Cache, extra);
            }
            return Err(eyre!("allocator refused {} bytes: {}", extra, e));
        }

        self.data.resize(bytes, 0);
        Ok(())
    }

    /// Frees the buffer and returns its bytes to the budget.
    pub fn release(&mut self) {
        let held = self.data.len();
        self.data = Vec::new();

        if let Some(budget) = &self.budget {
            budget.release(Pool::Cache, held);
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn budget(&self) -> Option<&Arc<MemoryBudget>> {
        self.budget.as_ref()
    }
}

impl Drop for CacheBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
