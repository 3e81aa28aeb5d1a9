// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Log text lives in message structs rather than at call sites. Each message implements
//! `Display` for its human-readable form and `StructuredLog` to emit a `tracing` event
//! (or open a span) with the same data as fields.
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - workflow executor lifecycle and execution events
//! * `messages::validation` - pipeline document loading and band checks
//! * `messages::confounds` - regressor construction and subject exclusion
//! * `messages::denoise` - cleaning and artifact reuse
//!
//! Subscriber setup is left to the binary (`RUST_LOG` via `tracing_subscriber::EnvFilter`).

pub mod messages;
