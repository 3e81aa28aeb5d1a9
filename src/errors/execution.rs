// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::engine::IterationContext;
use crate::errors::{BuildError, DenoiseError, GraphError, MissingDataError, ValidationError};

/// How a per-subject failure affects the rest of its configuration branch.
///
/// * `Lenient` - the failure is recorded in the owning join and the subject is left out
///   of aggregation; siblings keep running.
/// * `Strict` - the first failure aborts every unfinished stage of that configuration
///   branch. Other branches are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    Strict,
    #[default]
    Lenient,
}

/// Anything a stage computation can raise.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    MissingData(#[from] MissingDataError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Denoise(#[from] DenoiseError),

    #[error("Input port '{port}' {reason}")]
    Input { port: String, reason: String },

    #[error("Stage task did not finish: {0}")]
    Task(String),

    #[error("Branch aborted after an earlier failure")]
    Aborted,

    #[error("{0}")]
    Other(String),
}

impl StageError {
    pub fn input(port: &str, reason: impl Into<String>) -> Self {
        StageError::Input {
            port: port.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why an instance ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The stage's own computation raised an error
    Raised,
    /// An input came from a failed upstream instance; the stage never ran
    Upstream,
    /// The configuration branch was aborted under the strict strategy
    Aborted,
}

/// A recorded failure, attributed to exactly one iteration context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: String,
    pub context: IterationContext,
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn raised(stage: &str, context: &IterationContext, error: &StageError) -> Self {
        let kind = match error {
            StageError::Aborted => FailureKind::Aborted,
            _ => FailureKind::Raised,
        };
        Self {
            stage: stage.to_string(),
            context: context.clone(),
            kind,
            message: error.to_string(),
        }
    }

    pub fn upstream(stage: &str, context: &IterationContext, cause: &StageFailure) -> Self {
        Self {
            stage: stage.to_string(),
            context: context.clone(),
            kind: FailureKind::Upstream,
            message: format!("upstream stage '{}' failed: {}", cause.stage, cause.message),
        }
    }

    pub fn aborted(stage: &str, context: &IterationContext) -> Self {
        Self {
            stage: stage.to_string(),
            context: context.clone(),
            kind: FailureKind::Aborted,
            message: StageError::Aborted.to_string(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage '{}' failed [{}]: {}",
            self.stage, self.context, self.message
        )
    }
}

impl std::error::Error for StageFailure {}

/// Run-level errors. Per-subject faults never surface here; they are recorded in the
/// `ExecutionReport` instead.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Execution stalled with unfinished stages: {}", pending.join(", "))]
    Stalled { pending: Vec<String> },

    #[error("Internal executor error: {message}")]
    Internal { message: String },
}
