//! # Memory Budget Management
//!
//! This module provides memory budget tracking for cache buffers. It lets an
//! embedding engine cap how much memory all open file caches may hold, which
//! matters on embedded devices, mobile, and IoT targets.
//!
//! ## Architecture
//!
//! The memory budget uses a **reserved minimum + shared pool** model:
//!
//! ```text
//! +----------------------------------------------------------+
//! |                  Total Memory Budget                      |
//! |  (default: 25% of system RAM, minimum floor: 1 MB)       |
//! +----------------------------------------------------------+
//! |                                                          |
//! |  Reserved Pool (guaranteed minimum):                     |
//! |  +----------+                                            |
//! |  | Cache    |                                            |
//! |  | 256 KB   |                                            |
//! |  +----------+                                            |
//! |                                                          |
//! |  Shared Pool (remainder):                                |
//! |  +----------------------------------------------------+  |
//! |  | Available to cache windows once the reserve is used |  |
//! |  +----------------------------------------------------+  |
//! |                                                          |
//! +----------------------------------------------------------+
//! ```
//!
//! ## Enforcement Model
//!
//! The budget uses **hard limits**: a reservation that would exceed it is
//! refused. For cache buffers a refusal is the out-of-memory condition. The
//! handle keeps working without a cache rather than failing.
//!
//! ## Configuration
//!
//! ```rust,ignore
//! // Auto-detect (25% of system RAM, 1MB floor)
//! let budget = Arc::new(MemoryBudget::auto_detect());
//!
//! // Shared by every handle opened with it
//! let file = CachedFile::builder()
//!     .name("users.db")
//!     .source_path("./data")
//!     .budget(Arc::clone(&budget))
//!     .open()?;
//! ```

mod budget;
mod cache_buffer;

pub use budget::{BudgetStats, MemoryBudget, MemoryError, Pool};
pub use cache_buffer::CacheBuffer;
