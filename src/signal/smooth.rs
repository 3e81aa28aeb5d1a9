// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use ndarray::{Array3, Axis};

use crate::signal::SignalVolume;

/// Separable Gaussian smoothing of every time point.
///
/// `fwhm_mm` is converted to a per-axis sigma in voxels; the kernel is truncated at four
/// sigma and boundaries are handled by mirror reflection.
pub fn smooth(volume: &mut SignalVolume, fwhm_mm: f64) {
    let kernels: Vec<Vec<f64>> = volume
        .voxel_size_mm
        .iter()
        .map(|size| gaussian_kernel(fwhm_mm / (8.0 * 2f64.ln()).sqrt() / size))
        .collect();
    if kernels.iter().all(|k| k.len() <= 1) {
        return;
    }

    let [d0, d1, d2] = volume.dims;
    let mut scratch = Vec::new();
    for mut row in volume.data.rows_mut() {
        let Ok(mut grid) = Array3::from_shape_vec((d0, d1, d2), row.to_vec()) else {
            continue;
        };
        for (axis, kernel) in kernels.iter().enumerate() {
            if kernel.len() <= 1 {
                continue;
            }
            for mut lane in grid.lanes_mut(Axis(axis)) {
                scratch.clear();
                scratch.extend(lane.iter().copied());
                let radius = (kernel.len() / 2) as isize;
                let n = scratch.len() as isize;
                for (i, out) in lane.iter_mut().enumerate() {
                    *out = kernel
                        .iter()
                        .enumerate()
                        .map(|(k, w)| w * scratch[reflect(i as isize + k as isize - radius, n)])
                        .sum();
                }
            }
        }
        row.iter_mut().zip(grid.iter()).for_each(|(dst, src)| *dst = *src);
    }
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let radius = (4.0 * sigma).ceil() as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Mirror index into `0..n`: `d c b a | a b c d | d c b a`.
fn reflect(i: isize, n: isize) -> usize {
    let period = 2 * n;
    let mut m = i.rem_euclid(period);
    if m >= n {
        m = period - 1 - m;
    }
    m as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn volume(dims: [usize; 3], data: Array2<f64>) -> SignalVolume {
        SignalVolume {
            task: "rest".to_string(),
            dims,
            voxel_size_mm: [3.0, 3.0, 3.0],
            data,
        }
    }

    #[test]
    fn test_reflect_indices() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(-1, 1), 0);
    }

    #[test]
    fn test_constant_volume_is_unchanged() {
        let mut v = volume([4, 3, 2], Array2::from_elem((2, 24), 7.0));
        smooth(&mut v, 6.0);
        assert!(v.data.iter().all(|x| (x - 7.0).abs() < 1e-12));
    }

    #[test]
    fn test_impulse_spreads_and_keeps_mass() {
        let dims = [9, 9, 9];
        let mut data = Array2::zeros((1, 729));
        let center = (4 * 9 + 4) * 9 + 4;
        data[[0, center]] = 1.0;
        let mut v = volume(dims, data);

        smooth(&mut v, 6.0);

        assert!(v.data[[0, center]] < 1.0);
        assert!(v.data[[0, center + 1]] > 0.0);
        assert!((v.data.sum() - 1.0).abs() < 1e-9);
    }
}
