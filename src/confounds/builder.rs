// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Regressor construction from a raw confound table and a validated pipeline.
//!
//! Column layout is deterministic:
//!
//! 1. every `non_steady_state_outlier*` column, unconditionally
//! 2. every `cosine*` column when aCompCor is enabled
//! 3. per enabled kind, in [`ConfoundKind::ALL`] order: the kind's base columns, then for
//!    each base column `<col>_td` and, when the quadratic term is also requested,
//!    `<col>_quad` and `<col>_td_quad`
//! 4. one-hot spike columns `spike_0`, `spike_1`, ... in time order

use crate::config::{ConfoundKind, ConfoundOptions, PipelineConfig, SpikeConfig};
use crate::confounds::{ConfoundTable, RegressorMatrix};
use crate::errors::BuildError;

pub const MOTION_COLUMNS: [&str; 6] = ["trans_x", "trans_y", "trans_z", "rot_x", "rot_y", "rot_z"];
pub const FD_COLUMN: &str = "framewise_displacement";
pub const DVARS_COLUMN: &str = "std_dvars";

const NON_STEADY_PREFIX: &str = "non_steady_state_outlier";
const COSINE_PREFIX: &str = "cosine";
const ACOMPCOR_PREFIX: &str = "a_comp_cor_";

type Column = (String, Vec<f64>);

/// Build the regressor matrix for one subject.
pub fn build(table: &ConfoundTable, pipeline: &PipelineConfig) -> Result<RegressorMatrix, BuildError> {
    let mut columns: Vec<Column> = Vec::new();

    for name in table.columns_with_prefix(NON_STEADY_PREFIX) {
        columns.push(copy_column(table, name));
    }

    if pipeline.uses_acompcor() {
        for name in table.columns_with_prefix(COSINE_PREFIX) {
            columns.push(copy_column(table, name));
        }
    }

    for (kind, options) in pipeline.confounds().enabled() {
        let base = base_columns(table, kind)?;
        columns.extend(base.iter().map(|name| copy_column(table, name)));
        columns.extend(expansions(table, &base, options));
    }

    if let Some(spikes) = pipeline.spikes() {
        columns.extend(spike_columns(table, spikes)?);
    }

    Ok(RegressorMatrix::from_columns(table.n_timepoints(), columns))
}

/// First difference with the first sample set to zero.
pub fn temporal_derivative(signal: &[f64]) -> Vec<f64> {
    let mut derivative = Vec::with_capacity(signal.len());
    if let Some(first) = signal.first() {
        derivative.push(0.0);
        let mut previous = *first;
        for &value in &signal[1..] {
            derivative.push(value - previous);
            previous = value;
        }
    }
    derivative
}

pub fn quadratic_term(signal: &[f64]) -> Vec<f64> {
    signal.iter().map(|v| v * v).collect()
}

/// Time points flagged as outliers. A NaN sample never exceeds a threshold, and a zero
/// threshold flags nothing.
pub fn outliers(table: &ConfoundTable, spikes: &SpikeConfig) -> Result<Vec<usize>, BuildError> {
    let thresholds = [(FD_COLUMN, spikes.fd_th), (DVARS_COLUMN, spikes.dvars_th)];

    let mut missing = Vec::new();
    let mut criteria = Vec::new();
    for (column, threshold) in thresholds {
        let Some(threshold) = threshold.filter(|th| *th != 0.0) else {
            continue;
        };
        if !threshold.is_finite() {
            return Err(BuildError::MalformedSpikes(format!(
                "threshold for '{}' is {}",
                column, threshold
            )));
        }
        match table.column(column) {
            Some(values) => criteria.push((values, threshold)),
            None => missing.push(column.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(BuildError::MissingColumns {
            kind: "spikes".to_string(),
            missing,
        });
    }

    Ok((0..table.n_timepoints())
        .filter(|&t| criteria.iter().any(|(values, threshold)| values[t] > *threshold))
        .collect())
}

fn spike_columns(table: &ConfoundTable, spikes: &SpikeConfig) -> Result<Vec<Column>, BuildError> {
    let n = table.n_timepoints();
    Ok(outliers(table, spikes)?
        .into_iter()
        .enumerate()
        .map(|(k, t)| {
            let mut indicator = vec![0.0; n];
            indicator[t] = 1.0;
            (format!("spike_{}", k), indicator)
        })
        .collect())
}

fn base_columns(table: &ConfoundTable, kind: ConfoundKind) -> Result<Vec<String>, BuildError> {
    let required: Vec<String> = match kind {
        ConfoundKind::Motion => MOTION_COLUMNS.iter().map(|c| c.to_string()).collect(),
        ConfoundKind::WhiteMatter => vec!["white_matter".to_string()],
        ConfoundKind::Csf => vec!["csf".to_string()],
        ConfoundKind::GlobalSignal => vec!["global_signal".to_string()],
        ConfoundKind::Acompcor => {
            let found: Vec<String> = table
                .columns_with_prefix(ACOMPCOR_PREFIX)
                .into_iter()
                .map(str::to_string)
                .collect();
            if found.is_empty() {
                return Err(BuildError::MissingColumns {
                    kind: kind.to_string(),
                    missing: vec![format!("{}*", ACOMPCOR_PREFIX)],
                });
            }
            found
        }
    };

    let missing: Vec<String> = required
        .iter()
        .filter(|c| !table.has_column(c))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(BuildError::MissingColumns {
            kind: kind.to_string(),
            missing,
        });
    }
    Ok(required)
}

fn expansions(table: &ConfoundTable, base: &[String], options: &ConfoundOptions) -> Vec<Column> {
    if !options.temporal_derivative {
        return Vec::new();
    }

    let mut columns = Vec::new();
    for name in base {
        let signal = column_values(table, name);
        let derivative = temporal_derivative(&signal);
        if options.quadratic_term {
            let td_quad = quadratic_term(&derivative);
            columns.push((format!("{}_td", name), derivative));
            columns.push((format!("{}_quad", name), quadratic_term(&signal)));
            columns.push((format!("{}_td_quad", name), td_quad));
        } else {
            columns.push((format!("{}_td", name), derivative));
        }
    }
    columns
}

fn column_values(table: &ConfoundTable, name: &str) -> Vec<f64> {
    table
        .column(name)
        .map(|values| values.to_vec())
        .unwrap_or_default()
}

fn copy_column(table: &ConfoundTable, name: &str) -> Column {
    (name.to_string(), column_values(table, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;
    use serde_json::{json, Value};

    fn pipeline(confounds: Value, spikes: Value) -> PipelineConfig {
        validate(&json!({
            "name": "A",
            "confounds": confounds,
            "spikes": spikes,
            "aroma": false
        }))
        .unwrap()
    }

    fn motion_table(n: usize) -> ConfoundTable {
        let columns: Vec<(&str, Vec<f64>)> = MOTION_COLUMNS
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let values = (0..n).map(|t| (t * (j + 1)) as f64).collect::<Vec<f64>>();
                (*name, values)
            })
            .collect();
        ConfoundTable::from_columns(columns).unwrap()
    }

    #[test]
    fn test_derivative_of_constant_is_zero() {
        assert_eq!(temporal_derivative(&[3.0, 3.0, 3.0, 3.0]), vec![0.0; 4]);
        assert_eq!(temporal_derivative(&[1.0, 4.0, 2.0]), vec![0.0, 3.0, -2.0]);
        assert!(temporal_derivative(&[]).is_empty());
    }

    #[test]
    fn test_motion_with_derivative_and_quadratic() {
        let table = motion_table(5);
        let config = pipeline(
            json!({"motion": {"temporalDerivative": true, "quadraticTerm": true}}),
            json!(false),
        );

        let matrix = build(&table, &config).unwrap();

        assert_eq!(matrix.n_columns(), 24);
        assert_eq!(&matrix.names()[..6], &MOTION_COLUMNS.map(String::from));
        assert_eq!(
            &matrix.names()[6..9],
            &["trans_x_td", "trans_x_quad", "trans_x_td_quad"]
        );
        let td = matrix.column("trans_y_td").unwrap().to_vec();
        assert_eq!(td, vec![0.0, 2.0, 2.0, 2.0, 2.0]);
        let td_quad = matrix.column("trans_y_td_quad").unwrap().to_vec();
        assert_eq!(td_quad, vec![0.0, 4.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_quadratic_without_derivative_adds_nothing() {
        let table = motion_table(3);
        let config = pipeline(json!({"motion": {"quadraticTerm": true}}), json!(false));
        assert_eq!(build(&table, &config).unwrap().n_columns(), 6);
    }

    #[test]
    fn test_spikes_flag_fd_outliers() {
        let table =
            ConfoundTable::from_columns(vec![(FD_COLUMN, vec![0.1, 0.6, 0.2, 0.9])]).unwrap();
        let config = pipeline(json!({}), json!({"fd_th": 0.5, "dvars_th": false}));

        let matrix = build(&table, &config).unwrap();

        assert_eq!(matrix.names(), &["spike_0", "spike_1"]);
        assert_eq!(matrix.column("spike_0").unwrap().to_vec(), vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(matrix.column("spike_1").unwrap().to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_spikes_combine_fd_and_dvars_and_ignore_nan() {
        let table = ConfoundTable::from_columns(vec![
            (FD_COLUMN, vec![f64::NAN, 0.1, 0.1, 0.1]),
            (DVARS_COLUMN, vec![f64::NAN, 0.5, 2.0, 0.5]),
        ])
        .unwrap();
        let spikes = SpikeConfig {
            fd_th: Some(0.05),
            dvars_th: Some(1.5),
        };
        assert_eq!(outliers(&table, &spikes).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_threshold_adds_no_spikes() {
        let table =
            ConfoundTable::from_columns(vec![(FD_COLUMN, vec![0.0, 0.3, 0.2, 0.9])]).unwrap();
        let config = pipeline(json!({}), json!({"fd_th": 0}));
        assert_eq!(build(&table, &config).unwrap().n_columns(), 0);

        let spikes = SpikeConfig {
            fd_th: Some(0.0),
            dvars_th: None,
        };
        assert!(outliers(&table, &spikes).unwrap().is_empty());
    }

    #[test]
    fn test_spike_threshold_needs_its_column() {
        let table = motion_table(3);
        let config = pipeline(json!({}), json!({"dvars_th": 1.5}));
        assert_eq!(
            build(&table, &config),
            Err(BuildError::MissingColumns {
                kind: "spikes".to_string(),
                missing: vec![DVARS_COLUMN.to_string()]
            })
        );
    }

    #[test]
    fn test_missing_kind_columns() {
        let table = motion_table(3);
        let config = pipeline(json!({"whiteMatter": true, "csf": true}), json!(false));
        assert!(matches!(
            build(&table, &config),
            Err(BuildError::MissingColumns { kind, .. }) if kind == "whiteMatter"
        ));
    }

    #[test]
    fn test_layout_with_outliers_cosines_and_acompcor() {
        let table = ConfoundTable::from_columns(vec![
            ("cosine00", vec![1.0, 2.0]),
            ("csf", vec![1.0, 2.0]),
            ("a_comp_cor_00", vec![1.0, 2.0]),
            ("non_steady_state_outlier00", vec![1.0, 0.0]),
            ("white_matter", vec![1.0, 2.0]),
            ("a_comp_cor_01", vec![1.0, 2.0]),
        ])
        .unwrap();
        let config = pipeline(
            json!({"acompcor": true, "csf": {"temporalDerivative": true}, "whiteMatter": true}),
            json!(false),
        );

        let matrix = build(&table, &config).unwrap();

        assert_eq!(
            matrix.names(),
            &[
                "non_steady_state_outlier00",
                "cosine00",
                "white_matter",
                "csf",
                "csf_td",
                "a_comp_cor_00",
                "a_comp_cor_01"
            ]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let table = motion_table(6);
        let config = pipeline(json!({"motion": {"temporalDerivative": true}}), json!(false));
        assert_eq!(build(&table, &config), build(&table, &config));
    }
}
