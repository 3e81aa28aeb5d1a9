// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for workflow executor lifecycle and execution events.
//!
//! This module contains message types for logging events related to:
//! * Run start and completion
//! * Fan-out resolution over subjects
//! * Stage cache hits
//! * Stage failures and branch aborts

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Execution started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use rsfmri_denoise::observability::messages::engine::ExecutionStarted;
///
/// let msg = ExecutionStarted {
///     stage_count: 7,
///     max_concurrency: 4,
///     failure_strategy: "strict",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ExecutionStarted<'a> {
    pub stage_count: usize,
    pub max_concurrency: usize,
    pub failure_strategy: &'a str,
}

impl Display for ExecutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting workflow: {} stages, max_concurrency={}, failure_strategy={}",
            self.stage_count, self.max_concurrency, self.failure_strategy
        )
    }
}

impl StructuredLog for ExecutionStarted<'_> {
    fn log(&self) {
        tracing::info!(
            stage_count = self.stage_count,
            max_concurrency = self.max_concurrency,
            failure_strategy = self.failure_strategy,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "execution",
            span_name = name,
            stage_count = self.stage_count,
            max_concurrency = self.max_concurrency,
            failure_strategy = self.failure_strategy,
        )
    }
}

/// Execution finished; every instance reached a terminal state.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ExecutionCompleted {
    pub instance_count: usize,
    pub failed_count: usize,
    pub cached_count: usize,
    pub duration: std::time::Duration,
}

impl Display for ExecutionCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow completed: {} stage instances ({} failed, {} cached) in {:?}",
            self.instance_count, self.failed_count, self.cached_count, self.duration
        )
    }
}

impl StructuredLog for ExecutionCompleted {
    fn log(&self) {
        tracing::info!(
            instance_count = self.instance_count,
            failed_count = self.failed_count,
            cached_count = self.cached_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "execution_completed",
            span_name = name,
            instance_count = self.instance_count,
            failed_count = self.failed_count,
            duration = ?self.duration,
        )
    }
}

/// Execution failed before or while expanding the graph.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ExecutionFailed<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for ExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow execution failed: {}", self.error)
    }
}

impl StructuredLog for ExecutionFailed<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("execution_failed", span_name = name, error = %self.error)
    }
}

/// The iterable stage resolved; one branch opens per listed pipeline.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BranchesOpened<'a> {
    pub stage: &'a str,
    pub pipelines: &'a [String],
}

impl Display for BranchesOpened<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' opened {} pipeline branches: {}",
            self.stage,
            self.pipelines.len(),
            self.pipelines.join(", ")
        )
    }
}

impl StructuredLog for BranchesOpened<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            branch_count = self.pipelines.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "branches",
            span_name = name,
            stage = self.stage,
            branch_count = self.pipelines.len(),
        )
    }
}

/// A mapped stage was expanded over the subjects of one pipeline branch.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct FanOutResolved<'a> {
    pub stage: &'a str,
    pub pipeline: &'a str,
    pub width: usize,
}

impl Display for FanOutResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' fans out over {} subjects for pipeline '{}'",
            self.stage, self.width, self.pipeline
        )
    }
}

impl StructuredLog for FanOutResolved<'_> {
    fn log(&self) {
        tracing::debug!(
            stage = self.stage,
            pipeline = self.pipeline,
            width = self.width,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "fan_out",
            span_name = name,
            stage = self.stage,
            pipeline = self.pipeline,
            width = self.width,
        )
    }
}

/// A stage instance was satisfied from the stage cache.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct StageCacheHit<'a> {
    pub stage: &'a str,
    pub context: &'a str,
}

impl Display for StageCacheHit<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stage '{}' [{}] served from cache", self.stage, self.context)
    }
}

impl StructuredLog for StageCacheHit<'_> {
    fn log(&self) {
        tracing::debug!(stage = self.stage, context = self.context, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage_cache_hit",
            span_name = name,
            stage = self.stage,
            context = self.context,
        )
    }
}

/// A stage instance started running.
pub struct StageStarted<'a> {
    pub stage: &'a str,
    pub context: &'a str,
}

impl Display for StageStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Running stage '{}' [{}]", self.stage, self.context)
    }
}

impl StructuredLog for StageStarted<'_> {
    fn log(&self) {
        tracing::debug!(stage = self.stage, context = self.context, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "stage",
            span_name = name,
            stage = self.stage,
            context = self.context,
        )
    }
}

/// A stage instance failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use rsfmri_denoise::observability::messages::engine::StageFailed;
///
/// let msg = StageFailed {
///     stage: "denoise",
///     context: "pipeline=A subject=sub-01",
///     error: "Repetition time not found for task 'rest'",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct StageFailed<'a> {
    pub stage: &'a str,
    pub context: &'a str,
    pub error: &'a str,
}

impl Display for StageFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stage '{}' failed [{}]: {}", self.stage, self.context, self.error)
    }
}

impl StructuredLog for StageFailed<'_> {
    fn log(&self) {
        tracing::error!(
            stage = self.stage,
            context = self.context,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "stage_failed",
            span_name = name,
            stage = self.stage,
            context = self.context,
            error = self.error,
        )
    }
}

/// A pipeline branch was aborted under the strict failure strategy.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct BranchAborted<'a> {
    pub pipeline: &'a str,
    pub cause: &'a str,
}

impl Display for BranchAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Aborting pipeline branch '{}' after failure: {}",
            self.pipeline, self.cause
        )
    }
}

impl StructuredLog for BranchAborted<'_> {
    fn log(&self) {
        tracing::warn!(pipeline = self.pipeline, cause = self.cause, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "branch_aborted",
            span_name = name,
            pipeline = self.pipeline,
            cause = self.cause,
        )
    }
}

/// The dataset provider returned its index.
pub struct DatasetIndexed {
    pub recordings: usize,
    pub tasks: usize,
}

impl Display for DatasetIndexed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dataset indexed: {} recordings, repetition times for {} tasks",
            self.recordings, self.tasks
        )
    }
}

impl StructuredLog for DatasetIndexed {
    fn log(&self) {
        tracing::info!(recordings = self.recordings, tasks = self.tasks, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "dataset_indexed",
            span_name = name,
            recordings = self.recordings,
            tasks = self.tasks,
        )
    }
}
