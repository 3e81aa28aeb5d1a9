// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The concrete stages of the denoising workflow and the fixed graph that wires them.

pub mod comparison;
pub mod confound_prep;
pub mod denoise;
pub mod grab;
pub mod group;
pub mod quality;
pub mod selector;
pub mod workflow;

pub use comparison::PipelineComparisonStage;
pub use confound_prep::ConfoundPrep;
pub use denoise::{DenoiseSettings, DenoiseStage};
pub use grab::DatasetGrab;
pub use group::GroupConfounds;
pub use quality::SignalQuality;
pub use selector::PipelineSelector;
pub use workflow::{names, standard_graph, WorkflowSettings};

use crate::errors::StageError;

/// Run synchronous file or numeric work on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, StageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StageError::Task(e.to_string()))?
}
