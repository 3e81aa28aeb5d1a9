// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use tracing::info;

use crate::confounds::{ComparisonRow, PipelineComparison};
use crate::engine::{IterationContext, PortBindings, PortKind, PortSpec, PortValue};
use crate::errors::StageError;
use crate::traits::Stage;

pub const PIPELINES_PORT: &str = "pipelines";
pub const GROUPS_PORT: &str = "groups";
pub const COMPARISON_PORT: &str = "comparison";

/// Joins every pipeline branch into one comparison row per pipeline.
pub struct PipelineComparisonStage;

#[async_trait]
impl Stage for PipelineComparisonStage {
    fn name(&self) -> &'static str {
        "pipeline_comparison"
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::list(PIPELINES_PORT, PortKind::Pipeline),
            PortSpec::list(GROUPS_PORT, PortKind::GroupSummary),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::single(COMPARISON_PORT, PortKind::Json)]
    }

    async fn run(
        &self,
        _ctx: &IterationContext,
        inputs: PortBindings,
    ) -> Result<PortBindings, StageError> {
        let pipelines = inputs.list(PIPELINES_PORT)?;
        let groups = inputs.list(GROUPS_PORT)?;
        if pipelines.len() != groups.len() {
            return Err(StageError::input(
                GROUPS_PORT,
                format!("has {} entries for {} pipelines", groups.len(), pipelines.len()),
            ));
        }

        let mut rows = Vec::with_capacity(groups.len());
        for (pipeline, group) in pipelines.iter().zip(groups) {
            let name = match pipeline {
                PortValue::Pipeline(pipeline) => pipeline.name().to_string(),
                other => {
                    return Err(StageError::input(
                        PIPELINES_PORT,
                        format!("holds a {} value", other.describe()),
                    ))
                }
            };
            let row = match group {
                PortValue::GroupSummary(group) => ComparisonRow::from(group.as_ref()),
                PortValue::Failed(failure) => ComparisonRow::failed(&name, failure),
                other => {
                    return Err(StageError::input(
                        GROUPS_PORT,
                        format!("holds a {} value", other.describe()),
                    ))
                }
            };
            rows.push(row);
        }

        let comparison = PipelineComparison { rows };
        info!(
            pipelines = comparison.rows.len(),
            failed = comparison.rows.iter().filter(|row| row.failure.is_some()).count(),
            "Pipeline comparison assembled"
        );
        let value =
            serde_json::to_value(&comparison).map_err(|e| StageError::Other(e.to_string()))?;
        Ok(PortBindings::new().with(COMPARISON_PORT, PortValue::Json(value)))
    }
}
