// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::confounds::RegressorMatrix;
use crate::errors::DenoiseError;
use crate::signal::BandFilter;

/// Relative norm below which a filtered regressor is treated as linearly dependent.
const RANK_TOLERANCE: f64 = 1e-10;
/// Standard deviation below which a cleaned voxel is considered flat.
const FLAT_TOLERANCE: f64 = 1e-10;

/// Parameters of one cleaning pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanParams {
    pub tr: f64,
    pub high_pass: Option<f64>,
    pub low_pass: Option<f64>,
    pub detrend: bool,
    pub standardize: bool,
}

impl CleanParams {
    pub fn new(tr: f64, high_pass: Option<f64>, low_pass: Option<f64>) -> Self {
        Self {
            tr,
            high_pass,
            low_pass,
            detrend: true,
            standardize: true,
        }
    }
}

/// Temporal filtering plus confound regression of a time × voxel signal.
pub trait SignalCleaner: Send + Sync {
    fn clean(
        &self,
        signal: &Array2<f64>,
        regressors: &RegressorMatrix,
        params: &CleanParams,
    ) -> Result<Array2<f64>, DenoiseError>;
}

/// Detrend, band-filter signal and regressors alike, project the regressors out and
/// z-score the residual of every voxel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NuisanceCleaner;

impl SignalCleaner for NuisanceCleaner {
    fn clean(
        &self,
        signal: &Array2<f64>,
        regressors: &RegressorMatrix,
        params: &CleanParams,
    ) -> Result<Array2<f64>, DenoiseError> {
        if signal.nrows() != regressors.n_timepoints() {
            return Err(DenoiseError::ShapeMismatch {
                signal_rows: signal.nrows(),
                regressor_rows: regressors.n_timepoints(),
            });
        }
        for (name, column) in regressors.names().iter().zip(regressors.values().columns()) {
            if column.iter().any(|v| !v.is_finite()) {
                return Err(DenoiseError::NonFinite {
                    column: name.clone(),
                });
            }
        }

        let filter = BandFilter::new(params.high_pass, params.low_pass, params.tr)?;

        let mut cleaned = signal.clone();
        let mut confounds = regressors.values().clone();
        if params.detrend {
            detrend(&mut cleaned);
            detrend(&mut confounds);
        }
        filter.apply(&mut cleaned);
        filter.apply(&mut confounds);

        let basis = orthonormal_basis(&confounds);
        for mut voxel in cleaned.columns_mut() {
            for q in &basis {
                let weight = q.dot(&voxel);
                voxel.scaled_add(-weight, q);
            }
        }

        if params.standardize {
            standardize(&mut cleaned);
        }
        Ok(cleaned)
    }
}

/// Remove the least-squares line from every column.
pub fn detrend(data: &mut Array2<f64>) {
    let n = data.nrows();
    if n == 0 {
        return;
    }
    let t_mean = (n as f64 - 1.0) / 2.0;
    let t = Array1::from_iter((0..n).map(|i| i as f64 - t_mean));
    let t_norm = t.dot(&t);

    for mut column in data.columns_mut() {
        let mean = column.mean().unwrap_or(0.0);
        column -= mean;
        if t_norm > 0.0 {
            let slope = t.dot(&column) / t_norm;
            column.scaled_add(-slope, &t);
        }
    }
}

/// Modified Gram-Schmidt over the columns; dependent columns are dropped.
fn orthonormal_basis(columns: &Array2<f64>) -> Vec<Array1<f64>> {
    let mut basis: Vec<Array1<f64>> = Vec::new();
    for column in columns.axis_iter(Axis(1)) {
        let original_norm = norm(column);
        if original_norm == 0.0 {
            continue;
        }
        let mut v = column.to_owned();
        for q in &basis {
            let weight = q.dot(&v);
            v.scaled_add(-weight, q);
        }
        let residual = norm(v.view());
        if residual > RANK_TOLERANCE * original_norm {
            v /= residual;
            basis.push(v);
        }
    }
    basis
}

fn norm(v: ArrayView1<'_, f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// Z-score every column; constant columns become zero.
fn standardize(data: &mut Array2<f64>) {
    for mut column in data.columns_mut() {
        let mean = column.mean().unwrap_or(0.0);
        column -= mean;
        let std = column.std(0.0);
        if std > FLAT_TOLERANCE {
            column /= std;
        } else {
            column.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CleanParams {
        CleanParams {
            tr: 2.0,
            high_pass: None,
            low_pass: None,
            detrend: true,
            standardize: false,
        }
    }

    #[test]
    fn test_regressed_signal_is_orthogonal_to_confounds() {
        let n = 40;
        let confound: Vec<f64> = (0..n).map(|t| ((t * 7 % 11) as f64).sin()).collect();
        let other: Vec<f64> = (0..n).map(|t| ((t * 3 % 5) as f64).cos()).collect();
        let regressors = RegressorMatrix::from_columns(n, vec![("c".to_string(), confound.clone())]);
        let signal = Array2::from_shape_fn((n, 1), |(t, _)| 3.0 * confound[t] + other[t]);

        let cleaned = NuisanceCleaner.clean(&signal, &regressors, &params()).unwrap();

        let mut expected_basis = Array2::from_shape_vec((n, 1), confound).unwrap();
        detrend(&mut expected_basis);
        let dot = expected_basis.column(0).dot(&cleaned.column(0));
        assert!(dot.abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_regressors_are_tolerated() {
        let n = 20;
        let confound: Vec<f64> = (0..n).map(|t| (t as f64 * 0.7).sin()).collect();
        let regressors = RegressorMatrix::from_columns(
            n,
            vec![
                ("a".to_string(), confound.clone()),
                ("b".to_string(), confound.clone()),
            ],
        );
        let signal = Array2::from_shape_fn((n, 2), |(t, v)| confound[t] * (v + 1) as f64);

        let cleaned = NuisanceCleaner.clean(&signal, &regressors, &params()).unwrap();
        assert!(cleaned.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_empty_regressors_filter_only() {
        let n = 16;
        let signal = Array2::from_shape_fn((n, 3), |(t, v)| (t * (v + 1)) as f64 + 2.0);
        let mut p = params();
        p.standardize = true;

        let cleaned = NuisanceCleaner
            .clean(&signal, &RegressorMatrix::empty(n), &p)
            .unwrap();

        // linear ramps detrend to zero, and zero columns stay zero after standardizing
        assert!(cleaned.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_standardized_output_has_unit_variance() {
        let n = 50;
        let signal = Array2::from_shape_fn((n, 2), |(t, v)| ((t + v) as f64 * 0.9).sin() * 10.0);
        let mut p = params();
        p.standardize = true;

        let cleaned = NuisanceCleaner
            .clean(&signal, &RegressorMatrix::empty(n), &p)
            .unwrap();

        for column in cleaned.columns() {
            assert!(column.mean().unwrap().abs() < 1e-9);
            assert!((column.std(0.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_shape_mismatch_and_non_finite() {
        let signal = Array2::zeros((10, 1));
        assert!(matches!(
            NuisanceCleaner.clean(&signal, &RegressorMatrix::empty(9), &params()),
            Err(DenoiseError::ShapeMismatch { .. })
        ));

        let mut column = vec![0.0; 10];
        column[3] = f64::NAN;
        let regressors = RegressorMatrix::from_columns(10, vec![("csf".to_string(), column)]);
        assert!(matches!(
            NuisanceCleaner.clean(&signal, &regressors, &params()),
            Err(DenoiseError::NonFinite { column }) if column == "csf"
        ));
    }
}
