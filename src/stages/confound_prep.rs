// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::confounds::{build, ConfoundSummary, ConfoundTable};
use crate::engine::{IterationContext, PortBindings, PortKind, PortSpec, PortValue};
use crate::errors::StageError;
use crate::observability::messages::confounds::RegressorsBuilt;
use crate::observability::messages::StructuredLog;
use crate::stages::blocking;
use crate::traits::Stage;

pub const PIPELINE_PORT: &str = "pipeline";
pub const SIGNAL_PORT: &str = "signal";
pub const AROMA_SIGNAL_PORT: &str = "aroma_signal";
pub const CONFOUNDS_PORT: &str = "confounds";
pub const ENTITIES_PORT: &str = "entities";
pub const REGRESSORS_PORT: &str = "regressors";
pub const SUMMARY_PORT: &str = "summary";

/// Builds one subject's regressor matrix and motion summary for the branch's pipeline.
///
/// The recording paths and entities pass through unchanged so the denoise stage can stay
/// aligned with this one without iterating the dataset lists again.
pub struct ConfoundPrep;

#[async_trait]
impl Stage for ConfoundPrep {
    fn name(&self) -> &'static str {
        "confound_prep"
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::single(PIPELINE_PORT, PortKind::Pipeline),
            PortSpec::single(SIGNAL_PORT, PortKind::Path),
            PortSpec::single(AROMA_SIGNAL_PORT, PortKind::OptionalPath),
            PortSpec::single(CONFOUNDS_PORT, PortKind::Path),
            PortSpec::single(ENTITIES_PORT, PortKind::Entities),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::single(REGRESSORS_PORT, PortKind::Regressors),
            PortSpec::single(SUMMARY_PORT, PortKind::ConfoundSummary),
            PortSpec::single(SIGNAL_PORT, PortKind::Path),
            PortSpec::single(AROMA_SIGNAL_PORT, PortKind::OptionalPath),
            PortSpec::single(ENTITIES_PORT, PortKind::Entities),
        ]
    }

    async fn run(
        &self,
        _ctx: &IterationContext,
        inputs: PortBindings,
    ) -> Result<PortBindings, StageError> {
        let pipeline = inputs.pipeline(PIPELINE_PORT)?;
        let entities = inputs.entities(ENTITIES_PORT)?;
        let table_path = inputs.path(CONFOUNDS_PORT)?;
        let subject = entities.label();

        let (regressors, summary) = {
            let pipeline = pipeline.clone();
            let subject = subject.clone();
            blocking(move || {
                let table = ConfoundTable::from_tsv_path(&table_path)?;
                let regressors = build(&table, &pipeline)?;
                let summary = ConfoundSummary::from_table(&subject, &table, &regressors);
                Ok((regressors, summary))
            })
            .await?
        };

        RegressorsBuilt {
            pipeline: pipeline.name(),
            subject: &subject,
            columns: regressors.n_columns(),
            spikes: regressors.spike_count(),
        }
        .log();

        Ok(PortBindings::new()
            .with(REGRESSORS_PORT, PortValue::Regressors(Arc::new(regressors)))
            .with(SUMMARY_PORT, PortValue::ConfoundSummary(summary))
            .with(SIGNAL_PORT, inputs.get(SIGNAL_PORT)?.clone())
            .with(AROMA_SIGNAL_PORT, inputs.get(AROMA_SIGNAL_PORT)?.clone())
            .with(ENTITIES_PORT, PortValue::Entities(entities)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;
    use crate::dataset::Entities;
    use crate::errors::BuildError;
    use crate::stages::fixtures::{write_subject, TIMEPOINTS};
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn inputs(dir: &TempDir, pipeline: serde_json::Value) -> PortBindings {
        let func = dir.path().join("sub-01");
        PortBindings::new()
            .with(PIPELINE_PORT, PortValue::Pipeline(Arc::new(validate(&pipeline).unwrap())))
            .with(SIGNAL_PORT, PortValue::Path(func.join("sub-01_task-rest_bold.json")))
            .with(AROMA_SIGNAL_PORT, PortValue::OptionalPath(None))
            .with(
                CONFOUNDS_PORT,
                PortValue::Path(func.join("sub-01_task-rest_desc-confounds_regressors.tsv")),
            )
            .with(
                ENTITIES_PORT,
                PortValue::Entities(Entities::new().with("subject", "01").with("task", "rest")),
            )
    }

    #[tokio::test]
    async fn test_builds_regressors_and_summary() {
        let dir = TempDir::new().unwrap();
        write_subject(dir.path(), "01", 0.05, false);
        let pipeline = json!({
            "name": "24HMP",
            "confounds": {"motion": {"temporalDerivative": true, "quadraticTerm": true}},
            "spikes": false,
            "aroma": false
        });

        let outputs = ConfoundPrep
            .run(&IterationContext::shared(), inputs(&dir, pipeline))
            .await
            .unwrap();

        let regressors = outputs.regressors(REGRESSORS_PORT).unwrap();
        assert_eq!(regressors.n_columns(), 24);
        assert_eq!(regressors.n_timepoints(), TIMEPOINTS);

        let summary = outputs.confound_summary(SUMMARY_PORT).unwrap();
        assert_eq!(summary.subject, "sub-01_task-rest");
        assert_eq!(summary.n_regressors, 24);
        assert_eq!(
            outputs.path(SIGNAL_PORT).unwrap(),
            dir.path().join("sub-01").join("sub-01_task-rest_bold.json")
        );
    }

    #[tokio::test]
    async fn test_missing_column_is_a_build_error() {
        let dir = TempDir::new().unwrap();
        write_subject(dir.path(), "01", 0.05, false);
        let pipeline = json!({
            "name": "acompcor",
            "confounds": {"acompcor": true},
            "spikes": false,
            "aroma": false
        });

        let result = ConfoundPrep
            .run(&IterationContext::shared(), inputs(&dir, pipeline))
            .await;

        assert!(matches!(result, Err(StageError::Build(BuildError::MissingColumns { .. }))));
    }

    #[tokio::test]
    async fn test_unreadable_table() {
        let dir = TempDir::new().unwrap();
        let pipeline = json!({"name": "none", "confounds": {}, "spikes": false, "aroma": false});
        let bindings = inputs(&dir, pipeline)
            .with(CONFOUNDS_PORT, PortValue::Path(PathBuf::from("/nonexistent/confounds.tsv")));

        let result = ConfoundPrep.run(&IterationContext::shared(), bindings).await;

        assert!(matches!(result, Err(StageError::Build(_))));
    }
}
