// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod build;
mod config;
mod data;
mod denoise;
mod execution;
mod graph;

pub use build::BuildError;
pub use config::{ConfigError, ValidationError};
pub use data::MissingDataError;
pub use denoise::DenoiseError;
pub use execution::{ExecutionError, FailureKind, FailureStrategy, StageError, StageFailure};
pub use graph::GraphError;
