// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{FilterConfig, PipelineConfig};
use crate::confounds::ExclusionCriteria;
use crate::dataset::{DatasetProvider, DatasetQuery};
use crate::engine::{GraphBuilder, StageGraph};
use crate::errors::GraphError;
use crate::signal::{ArtifactStore, Denoiser};
use crate::stages::{
    comparison, confound_prep, denoise, grab, group, quality, selector, ConfoundPrep,
    DatasetGrab, DenoiseSettings, DenoiseStage, GroupConfounds, PipelineComparisonStage,
    PipelineSelector, SignalQuality,
};

/// Node names of the standard workflow graph.
pub mod names {
    pub const SELECTOR: &str = "pipeline_selector";
    pub const GRAB: &str = "dataset_grab";
    pub const CONFOUND_PREP: &str = "confound_prep";
    pub const DENOISE: &str = "denoise";
    pub const SIGNAL_QUALITY: &str = "signal_quality";
    pub const GROUP_CONFOUNDS: &str = "group_confounds";
    pub const PIPELINE_COMPARISON: &str = "pipeline_comparison";
}

/// Settings of the standard workflow that are not part of any pipeline.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub output_dir: PathBuf,
    pub filtering: FilterConfig,
    pub smoothing: bool,
    pub exclusion: ExclusionCriteria,
}

/// Build the fixed denoising graph.
///
/// ```text
/// pipeline_selector ──(per pipeline)──┐
/// dataset_grab ──(per subject)──> confound_prep ──> denoise ──> signal_quality
///                                       │                            │
///                                       └──────> group_confounds <───┘   (join over subjects)
///                                                      │
///                                             pipeline_comparison        (join over pipelines)
/// ```
pub fn standard_graph(
    pipelines: Vec<Arc<PipelineConfig>>,
    provider: Arc<dyn DatasetProvider>,
    query: DatasetQuery,
    settings: WorkflowSettings,
) -> Result<StageGraph, GraphError> {
    use names::*;

    let denoiser = Arc::new(Denoiser::new(Arc::new(ArtifactStore::new())));
    let denoise_settings = DenoiseSettings {
        output_dir: settings.output_dir,
        filtering: settings.filtering,
        smoothing: settings.smoothing,
    };
    let pipelines_port = selector::PIPELINES_PORT;

    GraphBuilder::new()
        .add_iterable(SELECTOR, Arc::new(PipelineSelector::new(pipelines)), pipelines_port)
        .add_stage(GRAB, Arc::new(DatasetGrab::new(provider, query)))
        .add_mapped(
            CONFOUND_PREP,
            Arc::new(ConfoundPrep),
            &[
                confound_prep::SIGNAL_PORT,
                confound_prep::AROMA_SIGNAL_PORT,
                confound_prep::CONFOUNDS_PORT,
                confound_prep::ENTITIES_PORT,
            ],
        )
        .add_mapped(
            DENOISE,
            Arc::new(DenoiseStage::new(denoiser, denoise_settings)),
            &[],
        )
        .add_mapped(SIGNAL_QUALITY, Arc::new(SignalQuality), &[])
        .add_join(
            GROUP_CONFOUNDS,
            Arc::new(GroupConfounds::new(settings.exclusion)),
            CONFOUND_PREP,
        )
        .add_join(PIPELINE_COMPARISON, Arc::new(PipelineComparisonStage), SELECTOR)
        // confound preparation, one instance per pipeline and subject
        .connect(SELECTOR, pipelines_port, CONFOUND_PREP, confound_prep::PIPELINE_PORT)
        .connect(GRAB, grab::SIGNALS_PORT, CONFOUND_PREP, confound_prep::SIGNAL_PORT)
        .connect(GRAB, grab::AROMA_SIGNALS_PORT, CONFOUND_PREP, confound_prep::AROMA_SIGNAL_PORT)
        .connect(GRAB, grab::CONFOUNDS_PORT, CONFOUND_PREP, confound_prep::CONFOUNDS_PORT)
        .connect(GRAB, grab::ENTITIES_PORT, CONFOUND_PREP, confound_prep::ENTITIES_PORT)
        // denoising, aligned with confound preparation
        .connect(SELECTOR, pipelines_port, DENOISE, denoise::PIPELINE_PORT)
        .connect(CONFOUND_PREP, confound_prep::SIGNAL_PORT, DENOISE, denoise::SIGNAL_PORT)
        .connect(CONFOUND_PREP, confound_prep::AROMA_SIGNAL_PORT, DENOISE, denoise::AROMA_SIGNAL_PORT)
        .connect(CONFOUND_PREP, confound_prep::ENTITIES_PORT, DENOISE, denoise::ENTITIES_PORT)
        .connect(CONFOUND_PREP, confound_prep::REGRESSORS_PORT, DENOISE, denoise::REGRESSORS_PORT)
        .connect(GRAB, grab::TR_REGISTRY_PORT, DENOISE, denoise::TR_REGISTRY_PORT)
        .connect(DENOISE, denoise::DENOISED_PORT, SIGNAL_QUALITY, quality::DENOISED_PORT)
        // subject join
        .connect(SELECTOR, pipelines_port, GROUP_CONFOUNDS, group::PIPELINE_PORT)
        .connect(CONFOUND_PREP, confound_prep::SUMMARY_PORT, GROUP_CONFOUNDS, group::SUMMARIES_PORT)
        .connect(SIGNAL_QUALITY, quality::DVARS_PORT, GROUP_CONFOUNDS, group::DVARS_PORT)
        // pipeline join
        .connect(SELECTOR, pipelines_port, PIPELINE_COMPARISON, comparison::PIPELINES_PORT)
        .connect(GROUP_CONFOUNDS, group::GROUP_PORT, PIPELINE_COMPARISON, comparison::GROUPS_PORT)
        .build()
}
