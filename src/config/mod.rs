//! # Configuration Module
//!
//! This module centralizes all configuration constants for the cached file
//! layer. Constants are grouped by their functional area and interdependencies
//! are documented and enforced through compile-time assertions.
//!
//! There is no configuration file. The cache size is the only per-file
//! tunable and is passed programmatically through
//! [`CachedFileBuilder`](crate::storage::CachedFileBuilder).
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
