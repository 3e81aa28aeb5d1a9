// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// An expected companion file or dataset record is absent.
///
/// Raised by the dataset collaborator; fatal to the affected subject's branch only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MissingDataError {
    #[error("Confound table not found for recording '{recording}': {expected}")]
    ConfoundTable { recording: PathBuf, expected: PathBuf },

    #[error("ICA-AROMA variant not found for recording '{recording}'")]
    AromaVariant { recording: PathBuf },

    #[error("Recording file not found: {0}")]
    Recording(PathBuf),

    #[error("Repetition time not found for task '{task}'")]
    RepetitionTime { task: String },

    #[error("{kind} '{value}' is not present in the dataset")]
    UnknownEntity { kind: String, value: String },

    #[error("Dataset manifest '{path}' could not be loaded: {reason}")]
    Manifest { path: PathBuf, reason: String },
}
