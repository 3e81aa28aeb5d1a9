// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for signal cleaning and denoised artifact handling.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::Span;

/// A denoised artifact already existed and was reused.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ArtifactReused<'a> {
    pub path: &'a Path,
}

impl Display for ArtifactReused<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Denoised output exists, reusing {}", self.path.display())
    }
}

impl StructuredLog for ArtifactReused<'_> {
    fn log(&self) {
        tracing::info!(path = %self.path.display(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("artifact_reused", span_name = name, path = %self.path.display())
    }
}

/// A recording was cleaned and written.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use rsfmri_denoise::observability::messages::denoise::ArtifactWritten;
/// use std::path::Path;
/// use std::time::Duration;
///
/// let msg = ArtifactWritten {
///     path: Path::new("out/sub-01_task-rest_denoised_pipeline-A.json"),
///     regressors: 24,
///     smoothed: false,
///     duration: Duration::from_millis(420),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ArtifactWritten<'a> {
    pub path: &'a Path,
    pub regressors: usize,
    pub smoothed: bool,
    pub duration: std::time::Duration,
}

impl Display for ArtifactWritten<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Denoised {} with {} regressors (smoothed={}) in {:?}",
            self.path.display(),
            self.regressors,
            self.smoothed,
            self.duration
        )
    }
}

impl StructuredLog for ArtifactWritten<'_> {
    fn log(&self) {
        tracing::info!(
            path = %self.path.display(),
            regressors = self.regressors,
            smoothed = self.smoothed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "artifact_written",
            span_name = name,
            path = %self.path.display(),
            regressors = self.regressors,
        )
    }
}

/// The regressor matrix has no columns; only filtering is applied.
pub struct FilteringOnly<'a> {
    pub pipeline: &'a str,
    pub task: &'a str,
}

impl Display for FilteringOnly<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' selects no regressors for task '{}'; applying temporal filtering only",
            self.pipeline, self.task
        )
    }
}

impl StructuredLog for FilteringOnly<'_> {
    fn log(&self) {
        tracing::info!(pipeline = self.pipeline, task = self.task, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "filtering_only",
            span_name = name,
            pipeline = self.pipeline,
            task = self.task,
        )
    }
}

/// Smoothing was requested but the pipeline uses an AROMA recording.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct SmoothingSkipped<'a> {
    pub pipeline: &'a str,
}

impl Display for SmoothingSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Smoothing not applied for pipeline '{}': AROMA recordings are already smoothed",
            self.pipeline
        )
    }
}

impl StructuredLog for SmoothingSkipped<'_> {
    fn log(&self) {
        tracing::debug!(pipeline = self.pipeline, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("smoothing_skipped", span_name = name, pipeline = self.pipeline)
    }
}
