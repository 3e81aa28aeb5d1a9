// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::fmt;

/// One position in an iterated list: its index and a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Iteration {
    pub index: usize,
    pub label: String,
}

impl Iteration {
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
        }
    }
}

/// Where in the configuration × subject cross-product a stage instance runs.
///
/// Shared instances carry neither iteration, per-configuration instances carry the
/// pipeline iteration, and mapped instances carry both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IterationContext {
    pub pipeline: Option<Iteration>,
    pub subject: Option<Iteration>,
}

impl IterationContext {
    pub fn shared() -> Self {
        Self::default()
    }

    pub fn for_pipeline(pipeline: Iteration) -> Self {
        Self {
            pipeline: Some(pipeline),
            subject: None,
        }
    }

    pub fn with_subject(&self, subject: Iteration) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            subject: Some(subject),
        }
    }

    pub fn pipeline_index(&self) -> Option<usize> {
        self.pipeline.as_ref().map(|it| it.index)
    }

    pub fn subject_index(&self) -> Option<usize> {
        self.subject.as_ref().map(|it| it.index)
    }

    pub fn pipeline_name(&self) -> Option<&str> {
        self.pipeline.as_ref().map(|it| it.label.as_str())
    }

    pub fn subject_label(&self) -> Option<&str> {
        self.subject.as_ref().map(|it| it.label.as_str())
    }
}

impl fmt::Display for IterationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.pipeline, &self.subject) {
            (None, None) => write!(f, "shared"),
            (Some(p), None) => write!(f, "pipeline={}", p.label),
            (None, Some(s)) => write!(f, "subject={}", s.label),
            (Some(p), Some(s)) => write!(f, "pipeline={} subject={}", p.label, s.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_both_iterations() {
        let ctx = IterationContext::for_pipeline(Iteration::new(1, "24HMP_8Phys_SpikeReg"))
            .with_subject(Iteration::new(3, "sub-04"));
        assert_eq!(ctx.to_string(), "pipeline=24HMP_8Phys_SpikeReg subject=sub-04");
        assert_eq!(ctx.pipeline_index(), Some(1));
        assert_eq!(ctx.subject_index(), Some(3));
        assert_eq!(IterationContext::shared().to_string(), "shared");
    }
}
