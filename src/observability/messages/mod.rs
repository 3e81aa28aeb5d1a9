// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable text and
//! [`StructuredLog`] to emit the same event with its fields attached.
//!
//! # Organization
//!
//! * `engine` - executor lifecycle, fan-out, caching and failure events
//! * `validation` - pipeline document loading and rejection
//! * `confounds` - regressor construction and subject exclusion
//! * `denoise` - signal cleaning and artifact reuse
//!
//! # Usage Pattern
//!
//! ```rust
//! use rsfmri_denoise::observability::messages::engine::ExecutionStarted;
//! use rsfmri_denoise::observability::messages::StructuredLog;
//!
//! let msg = ExecutionStarted {
//!     stage_count: 7,
//!     max_concurrency: 4,
//!     failure_strategy: "lenient",
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod confounds;
pub mod denoise;
pub mod engine;
pub mod validation;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a tracing event at its level.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
