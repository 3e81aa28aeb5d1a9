// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Regressor construction cannot satisfy the requested confound kinds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// A requested confound kind needs columns the raw table does not have.
    #[error("Confound kind '{kind}' requires columns missing from the table: {}", missing.join(", "))]
    MissingColumns { kind: String, missing: Vec<String> },

    /// Spike regressors were requested but the thresholds cannot be applied.
    #[error("Spike regressors requested with unusable settings: {0}")]
    MalformedSpikes(String),

    /// The raw table itself could not be read.
    #[error("Unable to read confound table: {0}")]
    Table(String),
}
