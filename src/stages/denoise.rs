// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::FilterConfig;
use crate::engine::{IterationContext, PortBindings, PortKind, PortSpec, PortValue};
use crate::errors::StageError;
use crate::signal::{artifact_path, DenoiseJob, Denoiser};
use crate::stages::blocking;
use crate::traits::Stage;

pub const PIPELINE_PORT: &str = "pipeline";
pub const SIGNAL_PORT: &str = "signal";
pub const AROMA_SIGNAL_PORT: &str = "aroma_signal";
pub const ENTITIES_PORT: &str = "entities";
pub const REGRESSORS_PORT: &str = "regressors";
pub const TR_REGISTRY_PORT: &str = "tr_registry";
pub const DENOISED_PORT: &str = "denoised";

/// Run-wide settings shared by every denoise instance.
#[derive(Debug, Clone)]
pub struct DenoiseSettings {
    pub output_dir: PathBuf,
    pub filtering: FilterConfig,
    pub smoothing: bool,
}

/// Cleans one subject's recording with the branch's pipeline.
///
/// AROMA pipelines clean the AROMA variant of the recording; everything else cleans the
/// preprocessed recording.
pub struct DenoiseStage {
    denoiser: Arc<Denoiser>,
    settings: DenoiseSettings,
}

impl DenoiseStage {
    pub fn new(denoiser: Arc<Denoiser>, settings: DenoiseSettings) -> Self {
        Self { denoiser, settings }
    }
}

#[async_trait]
impl Stage for DenoiseStage {
    fn name(&self) -> &'static str {
        "denoise"
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::single(PIPELINE_PORT, PortKind::Pipeline),
            PortSpec::single(SIGNAL_PORT, PortKind::Path),
            PortSpec::single(AROMA_SIGNAL_PORT, PortKind::OptionalPath),
            PortSpec::single(ENTITIES_PORT, PortKind::Entities),
            PortSpec::single(REGRESSORS_PORT, PortKind::Regressors),
            PortSpec::single(TR_REGISTRY_PORT, PortKind::TrRegistry),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::single(DENOISED_PORT, PortKind::Path)]
    }

    fn fingerprint(&self) -> Option<String> {
        let DenoiseSettings {
            output_dir,
            filtering,
            smoothing,
        } = &self.settings;
        Some(format!(
            "output_dir={:?};high_pass={:?};low_pass={:?};smoothing={}",
            output_dir, filtering.high_pass, filtering.low_pass, smoothing
        ))
    }

    async fn run(
        &self,
        _ctx: &IterationContext,
        inputs: PortBindings,
    ) -> Result<PortBindings, StageError> {
        let pipeline = inputs.pipeline(PIPELINE_PORT)?;
        let entities = inputs.entities(ENTITIES_PORT)?;
        let task = entities
            .task()
            .ok_or_else(|| StageError::input(ENTITIES_PORT, "has no task entity"))?
            .to_string();

        let signal = if pipeline.aroma() {
            inputs.optional_path(AROMA_SIGNAL_PORT)?.ok_or_else(|| {
                StageError::input(
                    AROMA_SIGNAL_PORT,
                    format!("is missing for {} but pipeline '{}' uses AROMA", entities.label(), pipeline.name()),
                )
            })?
        } else {
            inputs.path(SIGNAL_PORT)?
        };

        let job = DenoiseJob {
            output_path: artifact_path(&self.settings.output_dir, &signal, pipeline.name()),
            signal,
            task,
            regressors: inputs.regressors(REGRESSORS_PORT)?,
            pipeline,
            high_pass: self.settings.filtering.high_pass,
            low_pass: self.settings.filtering.low_pass,
            smoothing: self.settings.smoothing,
            tr_registry: inputs.tr_registry(TR_REGISTRY_PORT)?,
        };

        let denoiser = self.denoiser.clone();
        let outcome = blocking(move || Ok(denoiser.denoise(&job)?)).await?;

        Ok(PortBindings::new().with(DENOISED_PORT, PortValue::Path(outcome.path().to_path_buf())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;
    use crate::confounds::{build, ConfoundTable};
    use crate::dataset::{Entities, TrRegistry};
    use crate::errors::DenoiseError;
    use crate::signal::{ArtifactStore, SignalVolume};
    use crate::stages::fixtures::{write_subject, TIMEPOINTS, TR};
    use serde_json::json;
    use tempfile::TempDir;

    fn stage(out: &TempDir) -> DenoiseStage {
        DenoiseStage::new(
            Arc::new(Denoiser::new(Arc::new(ArtifactStore::new()))),
            DenoiseSettings {
                output_dir: out.path().to_path_buf(),
                filtering: FilterConfig::default(),
                smoothing: true,
            },
        )
    }

    fn inputs(dir: &TempDir, aroma: bool, registry: TrRegistry) -> PortBindings {
        let func = dir.path().join("sub-01");
        let pipeline = validate(&json!({
            "name": if aroma { "ICA-AROMA" } else { "24HMP" },
            "confounds": {"motion": true, "csf": true},
            "spikes": false,
            "aroma": aroma
        }))
        .unwrap();
        let table =
            ConfoundTable::from_tsv_path(func.join("sub-01_task-rest_desc-confounds_regressors.tsv"))
                .unwrap();
        let regressors = build(&table, &pipeline).unwrap();
        let aroma_path = func.join("sub-01_task-rest_desc-smoothAROMAnonaggr_bold.json");

        PortBindings::new()
            .with(PIPELINE_PORT, PortValue::Pipeline(Arc::new(pipeline)))
            .with(SIGNAL_PORT, PortValue::Path(func.join("sub-01_task-rest_bold.json")))
            .with(
                AROMA_SIGNAL_PORT,
                PortValue::OptionalPath(aroma_path.exists().then_some(aroma_path)),
            )
            .with(
                ENTITIES_PORT,
                PortValue::Entities(Entities::new().with("subject", "01").with("task", "rest")),
            )
            .with(REGRESSORS_PORT, PortValue::Regressors(Arc::new(regressors)))
            .with(TR_REGISTRY_PORT, PortValue::TrRegistry(Arc::new(registry)))
    }

    #[tokio::test]
    async fn test_writes_artifact_for_pipeline() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_subject(data.path(), "01", 0.05, false);

        let outputs = stage(&out)
            .run(
                &IterationContext::shared(),
                inputs(&data, false, TrRegistry::new().with("rest", TR)),
            )
            .await
            .unwrap();

        let denoised = outputs.path(DENOISED_PORT).unwrap();
        assert_eq!(
            denoised,
            out.path().join("sub-01_task-rest_bold_denoised_pipeline-24HMP.json")
        );
        let volume = SignalVolume::load(&denoised).unwrap();
        assert_eq!(volume.n_timepoints(), TIMEPOINTS);
    }

    #[tokio::test]
    async fn test_aroma_pipeline_cleans_aroma_variant() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_subject(data.path(), "01", 0.05, true);

        let outputs = stage(&out)
            .run(
                &IterationContext::shared(),
                inputs(&data, true, TrRegistry::new().with("rest", TR)),
            )
            .await
            .unwrap();

        assert_eq!(
            outputs.path(DENOISED_PORT).unwrap(),
            out.path()
                .join("sub-01_task-rest_desc-smoothAROMAnonaggr_bold_denoised_pipeline-ICA-AROMA.json")
        );
    }

    #[tokio::test]
    async fn test_aroma_pipeline_without_variant() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_subject(data.path(), "01", 0.05, false);

        let result = stage(&out)
            .run(
                &IterationContext::shared(),
                inputs(&data, true, TrRegistry::new().with("rest", TR)),
            )
            .await;

        assert!(matches!(result, Err(StageError::Input { port, .. }) if port == AROMA_SIGNAL_PORT));
    }

    #[tokio::test]
    async fn test_missing_repetition_time() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_subject(data.path(), "01", 0.05, false);

        let result = stage(&out)
            .run(&IterationContext::shared(), inputs(&data, false, TrRegistry::new()))
            .await;

        assert!(matches!(
            result,
            Err(StageError::Denoise(DenoiseError::MissingTr { task })) if task == "rest"
        ));
    }

    #[test]
    fn test_fingerprint_covers_every_setting() {
        let out = TempDir::new().unwrap();
        let with = |edit: fn(&mut DenoiseSettings)| {
            let mut settings = DenoiseSettings {
                output_dir: out.path().to_path_buf(),
                filtering: FilterConfig::default(),
                smoothing: false,
            };
            edit(&mut settings);
            DenoiseStage::new(Arc::new(Denoiser::new(Arc::new(ArtifactStore::new()))), settings)
                .fingerprint()
                .unwrap()
        };

        let base = with(|_| {});
        assert_eq!(base, with(|_| {}));
        assert_ne!(base, with(|s| s.output_dir.push("other")));
        assert_ne!(base, with(|s| s.filtering.high_pass = 0.01));
        assert_ne!(base, with(|s| s.filtering.low_pass = 0.1));
        assert_ne!(base, with(|s| s.smoothing = true));
    }
}
