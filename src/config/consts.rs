// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

// Pipeline document keys
pub const KEY_NAME: &str = "name";
pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_CONFOUNDS: &str = "confounds";
pub const KEY_SPIKES: &str = "spikes";
pub const KEY_AROMA: &str = "aroma";

/// Default high-pass cutoff in Hz
pub const DEFAULT_HIGH_PASS_HZ: f64 = 0.008;
/// Default low-pass cutoff in Hz
pub const DEFAULT_LOW_PASS_HZ: f64 = 0.08;
/// Gaussian smoothing kernel width in millimetres
pub const SMOOTHING_FWHM_MM: f64 = 6.0;
/// Butterworth order used for the magnitude response of the band filter
pub const BUTTERWORTH_ORDER: i32 = 5;

/// Mean framewise displacement above which a subject is excluded (mm)
pub const EXCLUSION_MEAN_FD_MM: f64 = 0.2;
/// Any single framewise displacement above which a subject is excluded (mm)
pub const EXCLUSION_MAX_FD_MM: f64 = 5.0;
/// Share of spike-flagged volumes above which a subject is excluded (percent)
pub const EXCLUSION_SPIKE_PERCENT: f64 = 20.0;

/// File written by the binary with the cross-pipeline comparison
pub const COMPARISON_FILE_NAME: &str = "pipelines_comparison.json";
