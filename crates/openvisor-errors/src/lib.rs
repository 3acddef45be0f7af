//! Centralized error types for OpenVisor
//!
//! This crate provides a unified error handling system for the OpenVisor
//! project, supporting both the per-frame hot path and the session lifecycle
//! with appropriate safety guarantees.
//!
//! # Architecture
//!
//! - [`common`]: Top-level error type and severity classification
//! - [`tracking`]: Per-frame tracking errors with hot-path-safe semantics
//! - [`session`]: Session lifecycle errors
//!
//! # Hot-path safety
//!
//! [`TrackingError`] is designed for the per-frame path: `Copy` semantics,
//! fixed `repr(u8)` representation, pre-allocated error codes, no heap.
//!
//! # Example
//!
//! ```
//! use openvisor_errors::prelude::*;
//!
//! fn query_pose(running: bool) -> TrackingResult<()> {
//!     if !running {
//!         return Err(TrackingError::SessionNotRunning);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod prelude;
pub mod session;
pub mod tracking;

pub use common::{ErrorSeverity, OpenVisorError};
pub use session::SessionError;
pub use tracking::TrackingError;

/// A specialized `Result` type for OpenVisor operations.
pub type Result<T> = std::result::Result<T, OpenVisorError>;

/// A specialized `Result` type for per-frame tracking operations.
pub type TrackingResult<T = ()> = std::result::Result<T, TrackingError>;
