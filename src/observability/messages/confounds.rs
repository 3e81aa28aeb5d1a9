// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for regressor construction and group-level quality control.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Regressor matrix built for one subject.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct RegressorsBuilt<'a> {
    pub pipeline: &'a str,
    pub subject: &'a str,
    pub columns: usize,
    pub spikes: usize,
}

impl Display for RegressorsBuilt<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Built {} regressors ({} spikes) for {} with pipeline '{}'",
            self.columns, self.spikes, self.subject, self.pipeline
        )
    }
}

impl StructuredLog for RegressorsBuilt<'_> {
    fn log(&self) {
        tracing::debug!(
            pipeline = self.pipeline,
            subject = self.subject,
            columns = self.columns,
            spikes = self.spikes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "regressors_built",
            span_name = name,
            pipeline = self.pipeline,
            subject = self.subject,
        )
    }
}

/// Subject left out of the group summary for excessive motion.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
///
/// # Example
/// ```
/// use rsfmri_denoise::observability::messages::confounds::SubjectExcluded;
///
/// let msg = SubjectExcluded {
///     pipeline: "24HMP_8Phys_SpikeReg",
///     subject: "sub-07_task-rest",
///     reason: "mean framewise displacement 0.31 mm exceeds 0.2 mm",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct SubjectExcluded<'a> {
    pub pipeline: &'a str,
    pub subject: &'a str,
    pub reason: &'a str,
}

impl Display for SubjectExcluded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Excluding {} from pipeline '{}': {}",
            self.subject, self.pipeline, self.reason
        )
    }
}

impl StructuredLog for SubjectExcluded<'_> {
    fn log(&self) {
        tracing::warn!(
            pipeline = self.pipeline,
            subject = self.subject,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "subject_excluded",
            span_name = name,
            pipeline = self.pipeline,
            subject = self.subject,
        )
    }
}
