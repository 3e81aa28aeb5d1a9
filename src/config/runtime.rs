// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::RunPlan;
use crate::dataset::ManifestDataset;
use crate::engine::{StageGraph, WorkflowExecutor};
use crate::errors::ConfigError;
use crate::stages::{standard_graph, WorkflowSettings};

/// Workflow runtime builder - assembles the stage graph and its executor from a run plan.
///
/// The `RuntimeBuilder` opens the dataset manifest named by the run file, wires the
/// standard denoising graph over the plan's validated pipelines and sizes the executor
/// from the executor options. Every structural problem (unreadable manifest, invalid
/// graph) surfaces here, before a single stage runs.
///
/// # Examples
///
/// ```no_run
/// use rsfmri_denoise::config::{load_and_validate_config, RuntimeBuilder};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let plan = load_and_validate_config("run.yaml")?;
/// let (graph, executor) = RuntimeBuilder::from_plan(&plan)?;
/// let report = executor.execute(&graph).await?;
/// println!("{} stage instances", report.len());
/// # Ok(())
/// # }
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build the graph and executor for a validated run plan.
    ///
    /// AROMA variants become mandatory in the dataset query as soon as one pipeline
    /// asks for AROMA, so a missing variant fails the dataset grab instead of a single
    /// subject deep inside a branch.
    pub fn from_plan(plan: &RunPlan) -> Result<(StageGraph, WorkflowExecutor), ConfigError> {
        let cfg = &plan.config;
        let provider = ManifestDataset::open(&cfg.dataset.manifest)?;

        let mut query = cfg.dataset.query.clone();
        query.require_aroma = plan.pipelines.iter().any(|pipeline| pipeline.aroma());

        let settings = WorkflowSettings {
            output_dir: cfg.output_dir.clone(),
            filtering: cfg.filtering,
            smoothing: cfg.smoothing,
            exclusion: cfg.exclusion,
        };
        let graph = standard_graph(plan.pipelines.clone(), Arc::new(provider), query, settings)?;

        let max_concurrency = cfg
            .executor_options
            .max_concurrency
            .unwrap_or_else(WorkflowExecutor::default_concurrency);
        let executor = WorkflowExecutor::new(max_concurrency, cfg.failure_strategy);

        Ok((graph, executor))
    }
}
