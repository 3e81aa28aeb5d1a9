// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use ndarray::{Array2, ArrayView1};
use std::path::Path;

use crate::errors::BuildError;

/// Raw per-subject confound table: time points × named columns.
///
/// Missing cells (`n/a` or empty, as written by fMRIPrep for the first derivative
/// sample) are stored as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfoundTable {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl ConfoundTable {
    /// Read a tab-separated table with a header row.
    pub fn from_tsv_path<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| BuildError::Table(format!("{}: {}", path.display(), e)))?;
        Self::from_tsv_reader(file)
            .map_err(|e| BuildError::Table(format!("{}: {}", path.display(), e)))
    }

    pub fn from_tsv_reader<R: std::io::Read>(reader: R) -> Result<Self, BuildError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| BuildError::Table(e.to_string()))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();

        let mut flat = Vec::new();
        let mut rows = 0;
        for record in reader.records() {
            let record = record.map_err(|e| BuildError::Table(e.to_string()))?;
            for (cell, column) in record.iter().zip(&columns) {
                flat.push(parse_cell(cell).ok_or_else(|| {
                    BuildError::Table(format!(
                        "row {} column '{}': cannot parse '{}'",
                        rows + 1,
                        column,
                        cell
                    ))
                })?);
            }
            rows += 1;
        }

        let values = Array2::from_shape_vec((rows, columns.len()), flat)
            .map_err(|e| BuildError::Table(e.to_string()))?;
        Ok(Self { columns, values })
    }

    /// Build a table from named columns of equal length.
    pub fn from_columns(columns: Vec<(&str, Vec<f64>)>) -> Result<Self, BuildError> {
        let rows = columns.first().map_or(0, |(_, values)| values.len());
        let mut values = Array2::zeros((rows, columns.len()));
        let mut names = Vec::with_capacity(columns.len());

        for (j, (name, column)) in columns.into_iter().enumerate() {
            if column.len() != rows {
                return Err(BuildError::Table(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    column.len(),
                    rows
                )));
            }
            values.column_mut(j).assign(&ArrayView1::from(&column[..]));
            names.push(name.to_string());
        }

        Ok(Self {
            columns: names,
            values,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_timepoints(&self) -> usize {
        self.values.nrows()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|j| self.values.column(j))
    }

    /// Column names starting with `prefix`, in table order.
    pub fn columns_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("n/a") || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}
