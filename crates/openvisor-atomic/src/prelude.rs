//! Prelude for openvisor-atomic.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use openvisor_atomic::prelude::*;
//!
//! let counters = AtomicCounters::new();
//! counters.inc_frames_opened();
//!
//! let mut stats = StreamingStats::new();
//! stats.record(16_600_000);
//! ```

pub use crate::counters::{AtomicCounters, CounterSnapshot};
pub use crate::stats::StreamingStats;
