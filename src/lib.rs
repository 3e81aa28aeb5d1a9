// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // run files, pipeline validation, runtime builder
pub mod confounds;  // regressor construction + motion QC
pub mod dataset;    // dataset collaborator interface
pub mod engine;     // stage graph executor
pub mod errors;     // error handling
pub mod observability;
pub mod signal;     // filtering, regression, denoised artifacts
pub mod stages;     // workflow stages + the standard graph
pub mod traits;     // unified abstractions
