// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod pipeline;
mod runtime;
mod validation;

pub mod consts;

pub use loader::{
    load_and_validate_config, load_config, Config, DatasetSection, ExecutorOptions, FilterConfig,
    RunPlan,
};
pub use pipeline::{ConfoundKind, ConfoundOptions, ConfoundSelection, PipelineConfig, SpikeConfig};
pub use runtime::RuntimeBuilder;
pub use validation::{load_pipeline, validate};
