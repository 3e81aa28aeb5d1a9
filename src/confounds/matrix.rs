// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Ordered nuisance regressors: time points × columns.
///
/// Produced by [`crate::confounds::build`]; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl RegressorMatrix {
    /// Assemble a matrix from columns that all have `n_timepoints` samples.
    pub(crate) fn from_columns(n_timepoints: usize, columns: Vec<(String, Vec<f64>)>) -> Self {
        let mut values = Array2::zeros((n_timepoints, columns.len()));
        let mut names = Vec::with_capacity(columns.len());
        for (j, (name, column)) in columns.into_iter().enumerate() {
            values.column_mut(j).assign(&ArrayView1::from(&column[..]));
            names.push(name);
        }
        Self { names, values }
    }

    /// A matrix with no regressors, which makes cleaning a pure filtering pass.
    pub fn empty(n_timepoints: usize) -> Self {
        Self {
            names: Vec::new(),
            values: Array2::zeros((n_timepoints, 0)),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_timepoints(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|j| self.values.column(j))
    }

    /// Number of one-hot spike columns.
    pub fn spike_count(&self) -> usize {
        self.names.iter().filter(|n| n.starts_with("spike_")).count()
    }
}
