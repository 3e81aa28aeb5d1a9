// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::errors::DenoiseError;

/// One recording: time points × voxels on a regular 3-D grid.
///
/// Voxel `v` of a row maps to grid position `(i, j, k)` with
/// `v = (i * dims[1] + j) * dims[2] + k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalVolume {
    pub task: String,
    pub dims: [usize; 3],
    pub voxel_size_mm: [f64; 3],
    pub data: Array2<f64>,
}

impl SignalVolume {
    pub fn n_timepoints(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_voxels(&self) -> usize {
        self.data.ncols()
    }

    /// Mean DVARS: the root mean square over voxels of each frame-to-frame difference,
    /// averaged over frames. `None` with fewer than two time points or no voxels.
    pub fn mean_dvars(&self) -> Option<f64> {
        let frames = self.n_timepoints();
        if frames < 2 || self.n_voxels() == 0 {
            return None;
        }
        let voxels = self.n_voxels() as f64;
        let total: f64 = (1..frames)
            .map(|t| {
                let squared: f64 = self
                    .data
                    .row(t)
                    .iter()
                    .zip(self.data.row(t - 1).iter())
                    .map(|(now, before)| (now - before).powi(2))
                    .sum();
                (squared / voxels).sqrt()
            })
            .sum();
        Some(total / (frames - 1) as f64)
    }

    fn check_shape(&self) -> Result<(), String> {
        let expected: usize = self.dims.iter().product();
        if expected != self.n_voxels() {
            return Err(format!(
                "grid {:?} holds {} voxels but rows have {}",
                self.dims,
                expected,
                self.n_voxels()
            ));
        }
        if self.voxel_size_mm.iter().any(|size| !(*size > 0.0)) {
            return Err(format!("voxel size {:?} must be positive", self.voxel_size_mm));
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DenoiseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| DenoiseError::io(path, e))?;
        let volume: SignalVolume =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| DenoiseError::Format {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        volume.check_shape().map_err(|reason| DenoiseError::Format {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(volume)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DenoiseError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| DenoiseError::io(path, e))?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|e| DenoiseError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
