//! # openvisor-atomic
//!
//! Frame-loop-safe atomic counters and metrics primitives for `OpenVisor`.
//!
//! This crate provides primitives for bookkeeping that can be used on the
//! per-frame hot path of the tracking loop without allocations, blocking, or
//! syscalls.
//!
//! ## Safety Guarantees
//!
//! - **No heap allocations** after initialization
//! - **No blocking operations** - all methods are lock-free
//! - **Deterministic execution time** for all operations
//!
//! ## Architecture
//!
//! - [`counters`] - Atomic counter types for hot-path accumulation
//! - [`stats`] - Plain-data windowed statistics
//!
//! ## Usage
//!
//! ```rust
//! use openvisor_atomic::AtomicCounters;
//!
//! // Create counters (done once at initialization)
//! let counters = AtomicCounters::new();
//!
//! // Hot-path operations (no allocations, no blocking)
//! counters.inc_frames_opened();
//! counters.inc_frames_dropped_invalid();
//!
//! // Read snapshot (non-hot path, typically in the metrics collector)
//! let values = counters.snapshot();
//! assert_eq!(values.frames_opened, 1);
//! ```

#![no_std]
#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod counters;
pub mod stats;

pub mod prelude;

pub use counters::{AtomicCounters, CounterSnapshot};
pub use stats::StreamingStats;
