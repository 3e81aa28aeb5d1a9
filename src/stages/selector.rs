// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::engine::{IterationContext, PortBindings, PortKind, PortSpec, PortValue};
use crate::errors::StageError;
use crate::traits::Stage;

pub const PIPELINES_PORT: &str = "pipelines";

/// Publishes the validated pipelines; the graph's iterable, one branch per pipeline.
pub struct PipelineSelector {
    pipelines: Vec<Arc<PipelineConfig>>,
}

impl PipelineSelector {
    pub fn new(pipelines: Vec<Arc<PipelineConfig>>) -> Self {
        Self { pipelines }
    }
}

#[async_trait]
impl Stage for PipelineSelector {
    fn name(&self) -> &'static str {
        "pipeline_selector"
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::list(PIPELINES_PORT, PortKind::Pipeline)]
    }

    async fn run(
        &self,
        _ctx: &IterationContext,
        _inputs: PortBindings,
    ) -> Result<PortBindings, StageError> {
        let pipelines = self
            .pipelines
            .iter()
            .cloned()
            .map(PortValue::Pipeline)
            .collect();
        Ok(PortBindings::new().with(PIPELINES_PORT, PortValue::List(pipelines)))
    }

    // No inputs to key on; a different selection under the same node name must rerun.
    fn cacheable(&self) -> bool {
        false
    }
}
