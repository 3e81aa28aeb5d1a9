// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_HIGH_PASS_HZ, DEFAULT_LOW_PASS_HZ};
use crate::config::{load_pipeline, PipelineConfig};
use crate::confounds::ExclusionCriteria;
use crate::dataset::DatasetQuery;
use crate::errors::{ConfigError, FailureStrategy};
use crate::observability::messages::validation::{PipelineAccepted, PipelineRejected};
use crate::observability::messages::StructuredLog;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Run configuration for one denoising workflow.
///
/// Loaded from YAML (`.yaml`/`.yml`) or TOML (`.toml`). Relative paths are resolved
/// against the directory holding the run file.
///
/// # Example
/// ```yaml
/// failure_strategy: lenient
/// executor_options:
///   max_concurrency: 4
/// output_dir: derivatives/denoised
/// dataset:
///   manifest: dataset.yaml
///   query:
///     task: rest
///     subjects: ["01", "02"]
/// filtering:
///   high_pass: 0.008
///   low_pass: 0.08
/// smoothing: true
/// pipelines:
///   - pipelines/pipeline-24HMP_8Phys_SpikeReg.json
///   - '{"name": "inline", "confounds": {}, "spikes": false, "aroma": false}'
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub failure_strategy: FailureStrategy,
    #[serde(default)]
    pub executor_options: ExecutorOptions,
    pub output_dir: PathBuf,
    pub dataset: DatasetSection,
    #[serde(default)]
    pub filtering: FilterConfig,
    #[serde(default)]
    pub smoothing: bool,
    #[serde(default)]
    pub exclusion: ExclusionCriteria,
    /// Pipeline document sources: file paths or inline JSON literals.
    pub pipelines: Vec<String>,
}

/// Executor-specific configuration options.
///
/// * `max_concurrency` - Maximum number of concurrently running stage instances
///   (defaults to the available parallelism)
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorOptions {
    pub max_concurrency: Option<usize>,
}

/// Where the dataset index comes from and which part of it to process.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSection {
    pub manifest: PathBuf,
    #[serde(default)]
    pub query: DatasetQuery,
}

/// Temporal band in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default = "default_high_pass")]
    pub high_pass: f64,
    #[serde(default = "default_low_pass")]
    pub low_pass: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            high_pass: DEFAULT_HIGH_PASS_HZ,
            low_pass: DEFAULT_LOW_PASS_HZ,
        }
    }
}

fn default_high_pass() -> f64 {
    DEFAULT_HIGH_PASS_HZ
}

fn default_low_pass() -> f64 {
    DEFAULT_LOW_PASS_HZ
}

/// A loaded run configuration with every pipeline document validated.
#[derive(Debug)]
pub struct RunPlan {
    pub config: Config,
    /// Validated pipelines in the order the run file lists them.
    pub pipelines: Vec<Arc<PipelineConfig>>,
}

/// Load a run configuration without validating the pipelines it names.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut cfg: Config = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        _ => return Err(ConfigError::UnsupportedFormat { extension }),
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    cfg.output_dir = resolve(base_dir, &cfg.output_dir);
    cfg.dataset.manifest = resolve(base_dir, &cfg.dataset.manifest);
    for source in cfg.pipelines.iter_mut() {
        if !is_literal(source) {
            *source = resolve(base_dir, Path::new(source.as_str()))
                .to_string_lossy()
                .into_owned();
        }
    }

    Ok(cfg)
}

/// Load a run configuration, validate its filter band and every pipeline it names.
///
/// Any invalid pipeline fails the whole load, before a single stage can run.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<RunPlan, ConfigError> {
    let config = load_config(path)?;

    let FilterConfig {
        high_pass,
        low_pass,
    } = config.filtering;
    if !(high_pass > 0.0 && high_pass < low_pass) {
        return Err(ConfigError::InvalidBand {
            high_pass,
            low_pass,
        });
    }

    if config.pipelines.is_empty() {
        return Err(ConfigError::NoPipelines);
    }

    let mut names = HashSet::new();
    let mut pipelines = Vec::with_capacity(config.pipelines.len());
    for source in &config.pipelines {
        let source_ref = describe_source(source);
        let pipeline = match load_pipeline(source) {
            Ok(pipeline) => pipeline,
            Err(error) => {
                PipelineRejected {
                    source_ref: &source_ref,
                    error: &error,
                }
                .log();
                return Err(ConfigError::Pipeline { source_ref, error });
            }
        };
        PipelineAccepted {
            pipeline: pipeline.name(),
            source_ref: &source_ref,
            confound_kinds: pipeline.confounds().enabled().count(),
            aroma: pipeline.aroma(),
        }
        .log();
        if !names.insert(pipeline.name().to_string()) {
            return Err(ConfigError::DuplicatePipeline {
                name: pipeline.name().to_string(),
            });
        }
        pipelines.push(Arc::new(pipeline));
    }

    info!(
        pipelines = pipelines.len(),
        manifest = %config.dataset.manifest.display(),
        "Run configuration loaded"
    );

    Ok(RunPlan { config, pipelines })
}

fn is_literal(source: &str) -> bool {
    source.trim_start().starts_with('{')
}

fn describe_source(source: &str) -> String {
    if is_literal(source) {
        "<inline>".to_string()
    } else {
        source.to_string()
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
