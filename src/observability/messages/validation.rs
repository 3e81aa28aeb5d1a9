// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline document loading and validation.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Pipeline document accepted.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use rsfmri_denoise::observability::messages::validation::PipelineAccepted;
///
/// let msg = PipelineAccepted {
///     pipeline: "24HMP_8Phys_SpikeReg",
///     source_ref: "pipelines/pipeline-24HMP_8Phys_SpikeReg.json",
///     confound_kinds: 3,
///     aroma: false,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct PipelineAccepted<'a> {
    pub pipeline: &'a str,
    pub source_ref: &'a str,
    pub confound_kinds: usize,
    pub aroma: bool,
}

impl Display for PipelineAccepted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' loaded from {}: {} confound kinds, aroma={}",
            self.pipeline, self.source_ref, self.confound_kinds, self.aroma
        )
    }
}

impl StructuredLog for PipelineAccepted<'_> {
    fn log(&self) {
        tracing::info!(
            pipeline = self.pipeline,
            source_ref = self.source_ref,
            confound_kinds = self.confound_kinds,
            aroma = self.aroma,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            pipeline = self.pipeline,
            source_ref = self.source_ref,
        )
    }
}

/// Pipeline document rejected by the validator.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct PipelineRejected<'a> {
    pub source_ref: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for PipelineRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline {} rejected: {}", self.source_ref, self.error)
    }
}

impl StructuredLog for PipelineRejected<'_> {
    fn log(&self) {
        tracing::error!(source_ref = self.source_ref, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            source_ref = self.source_ref,
            error = %self.error,
        )
    }
}

/// A requested low-pass cutoff is unusable at the recording's sampling rate.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct LowPassAboveNyquist {
    pub low_pass: f64,
    pub nyquist: f64,
}

impl Display for LowPassAboveNyquist {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Low-pass cutoff {} Hz is at or above the Nyquist frequency {} Hz; low-pass filtering skipped",
            self.low_pass, self.nyquist
        )
    }
}

impl StructuredLog for LowPassAboveNyquist {
    fn log(&self) {
        tracing::warn!(low_pass = self.low_pass, nyquist = self.nyquist, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "span_name",
            name = name,
            low_pass = self.low_pass,
            nyquist = self.nyquist,
        )
    }
}
