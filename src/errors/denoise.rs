// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Numeric or IO failure while cleaning one recording.
///
/// An already existing output path is a cache hit, never one of these.
#[derive(Error, Debug)]
pub enum DenoiseError {
    #[error("Repetition time not found for task '{task}'")]
    MissingTr { task: String },

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed signal volume '{path}': {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Regressor matrix has {regressor_rows} time points but the signal has {signal_rows}")]
    ShapeMismatch {
        signal_rows: usize,
        regressor_rows: usize,
    },

    #[error("Regressor column '{column}' contains non-finite values")]
    NonFinite { column: String },

    #[error("Invalid filter band: {0}")]
    InvalidBand(String),
}

impl DenoiseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DenoiseError::Io {
            path: path.into(),
            source,
        }
    }
}
