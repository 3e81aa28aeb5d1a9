// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Confound tables, regressor construction and motion quality control.

mod builder;
mod matrix;
mod summary;
mod table;

pub use builder::{
    build, outliers, quadratic_term, temporal_derivative, DVARS_COLUMN, FD_COLUMN, MOTION_COLUMNS,
};
pub use matrix::RegressorMatrix;
pub use summary::{
    ComparisonRow, ConfoundSummary, ExcludedSubject, ExclusionCriteria, GroupConfoundSummary,
    PipelineComparison, SubjectEntry,
};
pub use table::ConfoundTable;
