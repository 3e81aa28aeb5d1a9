// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::confounds::{ExclusionCriteria, GroupConfoundSummary, SubjectEntry};
use crate::engine::{IterationContext, PortBindings, PortKind, PortSpec, PortValue};
use crate::errors::StageError;
use crate::observability::messages::confounds::SubjectExcluded;
use crate::observability::messages::StructuredLog;
use crate::traits::Stage;

pub const PIPELINE_PORT: &str = "pipeline";
pub const SUMMARIES_PORT: &str = "summaries";
pub const DVARS_PORT: &str = "dvars";
pub const GROUP_PORT: &str = "group_summary";

/// Joins every subject of one pipeline into its group summary.
///
/// Subjects whose preparation or cleaning failed are carried as failures rather than
/// dropped, so the summary always accounts for the whole cohort.
pub struct GroupConfounds {
    criteria: ExclusionCriteria,
}

impl GroupConfounds {
    pub fn new(criteria: ExclusionCriteria) -> Self {
        Self { criteria }
    }
}

#[async_trait]
impl Stage for GroupConfounds {
    fn name(&self) -> &'static str {
        "group_confounds"
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::single(PIPELINE_PORT, PortKind::Pipeline),
            PortSpec::list(SUMMARIES_PORT, PortKind::ConfoundSummary),
            PortSpec::list(DVARS_PORT, PortKind::Measure),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::single(GROUP_PORT, PortKind::GroupSummary)]
    }

    fn fingerprint(&self) -> Option<String> {
        serde_json::to_string(&self.criteria).ok()
    }

    async fn run(
        &self,
        _ctx: &IterationContext,
        inputs: PortBindings,
    ) -> Result<PortBindings, StageError> {
        let pipeline = inputs.pipeline(PIPELINE_PORT)?;
        let summaries = inputs.list(SUMMARIES_PORT)?;
        let dvars = inputs.list(DVARS_PORT)?;
        if summaries.len() != dvars.len() {
            return Err(StageError::input(
                DVARS_PORT,
                format!("has {} entries for {} subjects", dvars.len(), summaries.len()),
            ));
        }

        let entries = summaries
            .iter()
            .zip(dvars)
            .map(|(summary, dvars)| subject_entry(summary, dvars))
            .collect::<Result<Vec<_>, _>>()?;
        let group = GroupConfoundSummary::aggregate(pipeline.name(), entries, &self.criteria);

        for excluded in &group.excluded {
            SubjectExcluded {
                pipeline: pipeline.name(),
                subject: &excluded.subject,
                reason: &excluded.reason,
            }
            .log();
        }

        Ok(PortBindings::new().with(GROUP_PORT, PortValue::GroupSummary(Arc::new(group))))
    }
}

/// A subject counts as failed when either its summary or its cleaning failed; the
/// earlier failure is the one recorded.
fn subject_entry(summary: &PortValue, dvars: &PortValue) -> Result<SubjectEntry, StageError> {
    let summary = match summary {
        PortValue::ConfoundSummary(summary) => summary.clone(),
        PortValue::Failed(failure) => {
            return Ok(SubjectEntry {
                summary: Err(failure.clone()),
                post_clean_dvars: None,
            })
        }
        other => {
            return Err(StageError::input(
                SUMMARIES_PORT,
                format!("holds a {} value", other.describe()),
            ))
        }
    };
    match dvars {
        PortValue::Measure(value) => Ok(SubjectEntry {
            summary: Ok(summary),
            post_clean_dvars: *value,
        }),
        PortValue::Failed(failure) => Ok(SubjectEntry {
            summary: Err(failure.clone()),
            post_clean_dvars: None,
        }),
        other => Err(StageError::input(
            DVARS_PORT,
            format!("holds a {} value", other.describe()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;
    use crate::confounds::ConfoundSummary;
    use crate::engine::Iteration;
    use crate::errors::{FailureKind, StageFailure};
    use serde_json::json;

    fn summary(subject: &str, mean_fd: f64) -> PortValue {
        PortValue::ConfoundSummary(ConfoundSummary {
            subject: subject.to_string(),
            n_timepoints: 100,
            n_regressors: 10,
            n_spikes: 0,
            spike_percent: 0.0,
            mean_fd: Some(mean_fd),
            max_fd: Some(mean_fd * 2.0),
            dof_loss: 0.1,
        })
    }

    fn inputs(summaries: Vec<PortValue>, dvars: Vec<PortValue>) -> PortBindings {
        let pipeline =
            validate(&json!({"name": "24HMP", "confounds": {"motion": true}, "spikes": false, "aroma": false}))
                .unwrap();
        PortBindings::new()
            .with(PIPELINE_PORT, PortValue::Pipeline(Arc::new(pipeline)))
            .with(SUMMARIES_PORT, PortValue::List(summaries))
            .with(DVARS_PORT, PortValue::List(dvars))
    }

    #[tokio::test]
    async fn test_aggregates_included_excluded_and_failed() {
        let ctx = IterationContext::for_pipeline(Iteration::new(0, "24HMP"));
        let failure = StageFailure::aborted(
            "denoise",
            &ctx.with_subject(Iteration::new(2, "sub-03_task-rest")),
        );
        let bindings = inputs(
            vec![
                summary("sub-01_task-rest", 0.1),
                summary("sub-02_task-rest", 0.5),
                summary("sub-03_task-rest", 0.1),
            ],
            vec![
                PortValue::Measure(Some(2.0)),
                PortValue::Measure(Some(9.0)),
                PortValue::Failed(failure),
            ],
        );

        let outputs = GroupConfounds::new(ExclusionCriteria::default())
            .run(&ctx, bindings)
            .await
            .unwrap();

        let group = outputs.group_summary(GROUP_PORT).unwrap();
        assert_eq!(group.pipeline, "24HMP");
        assert_eq!(group.included.len(), 1);
        assert_eq!(group.excluded[0].subject, "sub-02_task-rest");
        assert_eq!(group.failures[0].kind, FailureKind::Aborted);
        assert_eq!(group.mean_post_clean_dvars, Some(2.0));
    }

    #[tokio::test]
    async fn test_misaligned_lists_are_rejected() {
        let bindings = inputs(vec![summary("sub-01_task-rest", 0.1)], vec![]);

        let result = GroupConfounds::new(ExclusionCriteria::default())
            .run(&IterationContext::shared(), bindings)
            .await;

        assert!(matches!(result, Err(StageError::Input { port, .. }) if port == DVARS_PORT));
    }
}
