// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

use crate::errors::{GraphError, MissingDataError};

/// Errors raised while validating a pipeline configuration document.
///
/// Every variant names the offending location as a dotted path into the document
/// (`confounds.motion.temporalDerivative`, `spikes.fd_th`, ...) so the message points the
/// operator at the exact key to fix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The document could not be parsed as JSON at all.
    #[error("Pipeline document is not valid JSON: {0}")]
    Parse(String),

    /// The document (or a nested section) is not an object.
    #[error("Expected an object at '{path}'")]
    NotAnObject { path: String },

    /// A required key is absent.
    #[error("Missing required key '{key}'")]
    MissingKey { key: String },

    /// A key outside the fixed schema was found.
    #[error("Unknown key '{path}'")]
    UnknownKey { path: String },

    /// A confound kind outside {motion, whiteMatter, csf, globalSignal, acompcor}.
    #[error(
        "Unknown confound kind '{kind}' (expected one of motion, whiteMatter, csf, globalSignal, acompcor)"
    )]
    UnknownConfoundKind { kind: String },

    /// A boolean slot holds something that is neither a bool nor "true"/"false".
    #[error("Value at '{path}' is not boolean-like: {value}")]
    NotBooleanLike { path: String, value: String },

    /// A spike threshold is neither numeric nor explicitly false.
    #[error("Spike threshold '{path}' must be a number or false, found {value}")]
    InvalidThreshold { path: String, value: String },

    /// `name` is empty or not a string.
    #[error("Pipeline name must be a non-empty string, found {value}")]
    InvalidName { value: String },

    /// The document could not be read from disk.
    #[error("Unable to read pipeline document '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Errors raised while loading the run configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read run configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML run configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid TOML run configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported run configuration format '{extension}' (expected yaml, yml or toml)")]
    UnsupportedFormat { extension: String },

    #[error("Pipeline '{source_ref}' rejected: {error}")]
    Pipeline {
        source_ref: String,
        error: ValidationError,
    },

    #[error("Duplicate pipeline name '{name}'")]
    DuplicatePipeline { name: String },

    #[error("Run configuration lists no pipelines")]
    NoPipelines,

    #[error("Invalid filter band: high_pass={high_pass} must be below low_pass={low_pass}")]
    InvalidBand { high_pass: f64, low_pass: f64 },

    #[error("Dataset manifest unusable: {0}")]
    Dataset(#[from] MissingDataError),

    #[error("Workflow graph rejected: {0}")]
    Graph(#[from] GraphError),
}
