//! # Cached File Configuration Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships. Constants that depend
//! on each other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! MIN_CACHE_SIZE (512 bytes)
//!       │
//!       ├─> DEFAULT_CACHE_SIZE (must be >=)
//!       │     Requests of -1 resolve here.
//!       │
//!       ├─> MAX_CACHE_SIZE (must be >=)
//!       │     Explicit requests are clamped into [MIN, MAX].
//!       │
//!       └─> CACHE_ALIGNMENT (must be <=)
//!             Window starts are rounded down to this boundary when the
//!             rounded window still covers the request. If the alignment
//!             exceeded the smallest cache, an aligned window could never
//!             cover a request and alignment would silently never apply.
//!
//! CACHE_RESERVED (256KB)
//!       │
//!       └─> MAX_CACHE_SIZE (must be <=)
//!             A single handle at the maximum cache size must fit in the
//!             reserved cache pool of a floor-sized budget.
//! ```
//!
//! ## Critical Invariants
//!
//! These invariants are enforced by compile-time assertions:
//!
//! 1. `MIN_CACHE_SIZE <= DEFAULT_CACHE_SIZE <= MAX_CACHE_SIZE`
//! 2. `CACHE_ALIGNMENT <= MIN_CACHE_SIZE` and is a power of two
//! 3. `MAX_CACHE_SIZE <= CACHE_RESERVED`
//! 4. `TOTAL_RESERVED <= MIN_BUDGET_FLOOR`
//!
//! ## Usage
//!
//! ```ignore
//! use crate::config::{DEFAULT_CACHE_SIZE, MIN_CACHE_SIZE};
//! ```

// ============================================================================
// CACHE WINDOW CONFIGURATION
// These constants are tightly coupled - changing one may require changing others
// ============================================================================

/// Cache capacity used when the caller passes `-1` (`CacheSize::Default`).
pub const DEFAULT_CACHE_SIZE: usize = 4096;

/// Smallest cache window. Smaller explicit requests are raised to it.
pub const MIN_CACHE_SIZE: usize = 512;

/// Largest cache window a single handle may request.
pub const MAX_CACHE_SIZE: usize = 256 * 1024;

/// Boundary that refreshed windows are aligned down to.
pub const CACHE_ALIGNMENT: u64 = 512;

const _: () = assert!(
    MIN_CACHE_SIZE <= DEFAULT_CACHE_SIZE && DEFAULT_CACHE_SIZE <= MAX_CACHE_SIZE,
    "DEFAULT_CACHE_SIZE must lie within [MIN_CACHE_SIZE, MAX_CACHE_SIZE]"
);

const _: () = assert!(
    CACHE_ALIGNMENT.is_power_of_two() && CACHE_ALIGNMENT as usize <= MIN_CACHE_SIZE,
    "CACHE_ALIGNMENT must be a power of two no larger than MIN_CACHE_SIZE"
);

// ============================================================================
// MEMORY BUDGET CONFIGURATION
// These define the memory allocation strategy
// ============================================================================

/// Default memory budget as percentage of system RAM.
pub const DEFAULT_BUDGET_PERCENT: usize = 25;

/// Minimum memory budget floor in bytes (1MB).
pub const MIN_BUDGET_FLOOR: usize = 1024 * 1024;

/// Memory reserved for per-handle cache windows (256KB).
pub const CACHE_RESERVED: usize = 256 * 1024;

/// Total reserved memory across all pools.
pub const TOTAL_RESERVED: usize = CACHE_RESERVED;

const _: () = assert!(
    MAX_CACHE_SIZE <= CACHE_RESERVED,
    "MAX_CACHE_SIZE must fit in the reserved cache pool"
);

const _: () = assert!(
    TOTAL_RESERVED <= MIN_BUDGET_FLOOR,
    "reserved pools must fit in the minimum budget floor"
);

// ============================================================================
// PATH RESOLUTION
// ============================================================================

/// Slot value meaning "no slotted storage on this platform".
pub const NO_SLOT: i32 = -1;
