// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::consts::SMOOTHING_FWHM_MM;
use crate::config::PipelineConfig;
use crate::confounds::RegressorMatrix;
use crate::dataset::TrRegistry;
use crate::errors::DenoiseError;
use crate::observability::messages::denoise::{
    ArtifactReused, ArtifactWritten, FilteringOnly, SmoothingSkipped,
};
use crate::observability::messages::StructuredLog;
use crate::signal::{smooth, ArtifactOutcome, ArtifactStore, CleanParams, NuisanceCleaner, SignalCleaner, SignalVolume};

/// Everything needed to denoise one recording with one pipeline.
#[derive(Debug, Clone)]
pub struct DenoiseJob {
    pub signal: PathBuf,
    pub task: String,
    pub regressors: Arc<RegressorMatrix>,
    pub pipeline: Arc<PipelineConfig>,
    pub high_pass: f64,
    pub low_pass: f64,
    pub smoothing: bool,
    pub output_path: PathBuf,
    pub tr_registry: Arc<TrRegistry>,
}

/// Runs [`DenoiseJob`]s against a shared [`ArtifactStore`].
///
/// The output path is the cache key: when it already exists the job returns it
/// untouched, without reading the recording or checking its contents.
pub struct Denoiser {
    cleaner: Arc<dyn SignalCleaner>,
    store: Arc<ArtifactStore>,
    fwhm_mm: f64,
}

impl Denoiser {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self::with_cleaner(Arc::new(NuisanceCleaner), store)
    }

    pub fn with_cleaner(cleaner: Arc<dyn SignalCleaner>, store: Arc<ArtifactStore>) -> Self {
        Self {
            cleaner,
            store,
            fwhm_mm: SMOOTHING_FWHM_MM,
        }
    }

    pub fn denoise(&self, job: &DenoiseJob) -> Result<ArtifactOutcome, DenoiseError> {
        if job.output_path.exists() {
            ArtifactReused {
                path: &job.output_path,
            }
            .log();
            return Ok(ArtifactOutcome::Reused(job.output_path.clone()));
        }

        let tr = job
            .tr_registry
            .get(&job.task)
            .ok_or_else(|| DenoiseError::MissingTr {
                task: job.task.clone(),
            })?;

        let started = Instant::now();
        let pipeline = job.pipeline.as_ref();
        let smoothed = job.smoothing && !pipeline.aroma();
        let outcome = self.store.create_or_reuse(&job.output_path, |partial| {
            let mut volume = SignalVolume::load(&job.signal)?;

            if smoothed {
                smooth(&mut volume, self.fwhm_mm);
            } else if job.smoothing {
                SmoothingSkipped {
                    pipeline: pipeline.name(),
                }
                .log();
            }

            // aCompCor pipelines are high-pass filtered only
            let low_pass = (!pipeline.uses_acompcor()).then_some(job.low_pass);
            let params = CleanParams::new(tr, Some(job.high_pass), low_pass);

            if job.regressors.is_empty() {
                FilteringOnly {
                    pipeline: pipeline.name(),
                    task: &job.task,
                }
                .log();
            }

            volume.data = self.cleaner.clean(&volume.data, &job.regressors, &params)?;
            volume.save(partial)
        })?;

        match &outcome {
            ArtifactOutcome::Created(path) => ArtifactWritten {
                path,
                regressors: job.regressors.n_columns(),
                smoothed,
                duration: started.elapsed(),
            }
            .log(),
            ArtifactOutcome::Reused(path) => ArtifactReused { path }.log(),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;
    use crate::signal::artifact_path;
    use ndarray::Array2;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingCleaner {
        calls: AtomicUsize,
        last_params: parking_lot::Mutex<Option<CleanParams>>,
        last_signal: parking_lot::Mutex<Option<Array2<f64>>>,
    }

    impl CountingCleaner {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_params: parking_lot::Mutex::new(None),
                last_signal: parking_lot::Mutex::new(None),
            }
        }
    }

    impl SignalCleaner for CountingCleaner {
        fn clean(
            &self,
            signal: &Array2<f64>,
            _regressors: &RegressorMatrix,
            params: &CleanParams,
        ) -> Result<Array2<f64>, DenoiseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_params.lock() = Some(*params);
            *self.last_signal.lock() = Some(signal.clone());
            Ok(signal.clone())
        }
    }

    fn pipeline(confounds: serde_json::Value) -> Arc<PipelineConfig> {
        pipeline_with(confounds, false)
    }

    fn pipeline_with(confounds: serde_json::Value, aroma: bool) -> Arc<PipelineConfig> {
        Arc::new(
            validate(&json!({
                "name": "A",
                "confounds": confounds,
                "spikes": false,
                "aroma": aroma
            }))
            .unwrap(),
        )
    }

    /// Overwrite the job's recording with a single lit voxel in the middle of a 3x1x1 row.
    fn write_impulse(job: &DenoiseJob) -> Array2<f64> {
        let data = Array2::from_shape_fn((30, 3), |(_, v)| if v == 1 { 1.0 } else { 0.0 });
        SignalVolume {
            task: "rest".to_string(),
            dims: [3, 1, 1],
            voxel_size_mm: [3.0, 3.0, 3.0],
            data: data.clone(),
        }
        .save(&job.signal)
        .unwrap();
        data
    }

    fn job(dir: &TempDir, pipeline: Arc<PipelineConfig>, tr: Option<f64>) -> DenoiseJob {
        let signal = dir.path().join("sub-01_task-rest_bold.json");
        SignalVolume {
            task: "rest".to_string(),
            dims: [2, 1, 1],
            voxel_size_mm: [3.0, 3.0, 3.0],
            data: Array2::from_shape_fn((30, 2), |(t, v)| ((t + v) as f64 * 0.5).sin()),
        }
        .save(&signal)
        .unwrap();

        let mut registry = TrRegistry::new();
        if let Some(tr) = tr {
            registry.insert("rest", tr);
        }
        let output_path = artifact_path(&dir.path().join("out"), &signal, pipeline.name());
        DenoiseJob {
            signal,
            task: "rest".to_string(),
            regressors: Arc::new(RegressorMatrix::empty(30)),
            pipeline,
            high_pass: 0.008,
            low_pass: 0.08,
            smoothing: false,
            output_path,
            tr_registry: Arc::new(registry),
        }
    }

    #[test]
    fn test_denoise_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cleaner = Arc::new(CountingCleaner::new());
        let denoiser = Denoiser::with_cleaner(cleaner.clone(), Arc::new(ArtifactStore::new()));
        let job = job(&dir, pipeline(json!({})), Some(2.0));

        let first = denoiser.denoise(&job).unwrap();
        let second = denoiser.denoise(&job).unwrap();

        assert!(matches!(first, ArtifactOutcome::Created(_)));
        assert!(matches!(second, ArtifactOutcome::Reused(_)));
        assert_eq!(first.path(), second.path());
        assert_eq!(cleaner.calls.load(Ordering::SeqCst), 1);
        assert!(job.output_path.exists());
    }

    #[test]
    fn test_missing_tr() {
        let dir = TempDir::new().unwrap();
        let denoiser = Denoiser::new(Arc::new(ArtifactStore::new()));
        let job = job(&dir, pipeline(json!({})), None);

        assert!(matches!(
            denoiser.denoise(&job),
            Err(DenoiseError::MissingTr { task }) if task == "rest"
        ));
        assert!(!job.output_path.exists());
    }

    #[test]
    fn test_acompcor_uses_high_pass_only() {
        let dir = TempDir::new().unwrap();
        let cleaner = Arc::new(CountingCleaner::new());
        let denoiser = Denoiser::with_cleaner(cleaner.clone(), Arc::new(ArtifactStore::new()));

        let job = job(&dir, pipeline(json!({"acompcor": true})), Some(2.0));
        denoiser.denoise(&job).unwrap();

        let params = cleaner.last_params.lock().unwrap();
        assert_eq!(params.high_pass, Some(0.008));
        assert_eq!(params.low_pass, None);
    }

    #[test]
    fn test_other_pipelines_use_both_cutoffs() {
        let dir = TempDir::new().unwrap();
        let cleaner = Arc::new(CountingCleaner::new());
        let denoiser = Denoiser::with_cleaner(cleaner.clone(), Arc::new(ArtifactStore::new()));

        let job = job(&dir, pipeline(json!({"motion": true})), Some(2.0));
        denoiser.denoise(&job).unwrap();

        let params = cleaner.last_params.lock().unwrap();
        assert_eq!(params.tr, 2.0);
        assert_eq!(params.high_pass, Some(0.008));
        assert_eq!(params.low_pass, Some(0.08));
    }

    #[test]
    fn test_smoothing_spreads_signal_before_cleaning() {
        let dir = TempDir::new().unwrap();
        let cleaner = Arc::new(CountingCleaner::new());
        let denoiser = Denoiser::with_cleaner(cleaner.clone(), Arc::new(ArtifactStore::new()));
        let mut job = job(&dir, pipeline_with(json!({}), false), Some(2.0));
        job.smoothing = true;
        let impulse = write_impulse(&job);

        denoiser.denoise(&job).unwrap();

        let seen = cleaner.last_signal.lock().clone().unwrap();
        assert_ne!(seen, impulse);
        for row in seen.rows() {
            assert!(row[0] > 0.0 && row[2] > 0.0);
            assert!(row[1] < 1.0);
            assert!((row[0] - row[2]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_aroma_pipelines_are_never_smoothed() {
        let dir = TempDir::new().unwrap();
        let cleaner = Arc::new(CountingCleaner::new());
        let denoiser = Denoiser::with_cleaner(cleaner.clone(), Arc::new(ArtifactStore::new()));
        let mut job = job(&dir, pipeline_with(json!({}), true), Some(2.0));
        job.smoothing = true;
        let impulse = write_impulse(&job);

        denoiser.denoise(&job).unwrap();

        assert_eq!(cleaner.last_signal.lock().clone().unwrap(), impulse);
    }

    #[test]
    fn test_real_cleaner_writes_standardized_output() {
        let dir = TempDir::new().unwrap();
        let denoiser = Denoiser::new(Arc::new(ArtifactStore::new()));
        let job = job(&dir, pipeline(json!({})), Some(2.0));

        denoiser.denoise(&job).unwrap();

        let cleaned = SignalVolume::load(&job.output_path).unwrap();
        assert_eq!(cleaned.data.dim(), (30, 2));
        assert!(cleaned.data.iter().all(|v| v.is_finite()));
    }
}
