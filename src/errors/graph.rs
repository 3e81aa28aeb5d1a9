// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors raised while wiring or expanding the stage graph.
///
/// All of these are detected before the affected stages are dispatched: wiring problems
/// at `GraphBuilder::build`, fan-out shape problems as soon as the iterated lists are
/// known and before any mapped instance runs.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Two stages were registered under the same name
    DuplicateStage { stage: String },
    /// An edge references a stage that was never added
    UnknownStage { stage: String },
    /// An edge references a port the stage does not declare
    UnknownPort { stage: String, port: String },
    /// Upstream and downstream port kinds are incompatible
    PortKindMismatch {
        from: String,
        to: String,
        expected: String,
        found: String,
    },
    /// A declared input port has no incoming edge
    UnboundInput { stage: String, port: String },
    /// A declared input port has more than one incoming edge
    DuplicateBinding { stage: String, port: String },
    /// A circular dependency was detected between stages
    CyclicDependency { cycle: Vec<String> },
    /// A join names a source that is neither the selector nor a mapped stage
    InvalidJoinSource { stage: String, source: String },
    /// Per-subject output flows into a stage that does not join it
    UnjoinedFanOut { from: String, to: String },
    /// A second iterable stage was added
    MultipleIterables { first: String, second: String },
    /// A mapped stage iterates no list and has no mapped upstream
    NothingToIterate { stage: String },
    /// Iterated lists of one fan-out disagree in length
    MismatchedFanOut {
        context: String,
        lengths: Vec<(String, usize)>,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::DuplicateStage { stage } => write!(f, "Duplicate stage name: '{}'", stage),
            GraphError::UnknownStage { stage } => write!(f, "Edge references unknown stage '{}'", stage),
            GraphError::UnknownPort { stage, port } => {
                write!(f, "Stage '{}' has no port named '{}'", stage, port)
            }
            GraphError::PortKindMismatch {
                from,
                to,
                expected,
                found,
            } => write!(
                f,
                "Edge {} -> {} connects incompatible ports: expected {}, found {}",
                from, to, expected, found
            ),
            GraphError::UnboundInput { stage, port } => {
                write!(f, "Input port '{}.{}' is not connected", stage, port)
            }
            GraphError::DuplicateBinding { stage, port } => {
                write!(f, "Input port '{}.{}' is connected more than once", stage, port)
            }
            GraphError::CyclicDependency { cycle } => {
                write!(f, "Cyclic dependency detected: {}", cycle.join(" -> "))
            }
            GraphError::InvalidJoinSource { stage, source } => write!(
                f,
                "Join stage '{}' names '{}' as its source, which is not a fan-out",
                stage, source
            ),
            GraphError::UnjoinedFanOut { from, to } => write!(
                f,
                "Per-subject output of '{}' reaches '{}' without passing through a join",
                from, to
            ),
            GraphError::MultipleIterables { first, second } => write!(
                f,
                "Only one configuration selector is supported, found '{}' and '{}'",
                first, second
            ),
            GraphError::NothingToIterate { stage } => {
                write!(f, "Mapped stage '{}' has no iterated input", stage)
            }
            GraphError::MismatchedFanOut { context, lengths } => {
                write!(f, "Fan-out lists differ in length ({}): ", context)?;
                for (i, (port, len)) in lengths.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", port, len)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GraphError {}
