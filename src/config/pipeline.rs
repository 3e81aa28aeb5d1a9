// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Validated pipeline configuration.
//!
//! A [`PipelineConfig`] can only be obtained from [`crate::config::validate`] (or the
//! loaders built on it), so every value reaching the regressor builder or the denoiser
//! has already been checked against the schema and had its boolean-like leaves
//! normalized.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Confound kinds, declared in the fixed order used for regressor column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfoundKind {
    Motion,
    WhiteMatter,
    Csf,
    GlobalSignal,
    Acompcor,
}

impl ConfoundKind {
    pub const ALL: [ConfoundKind; 5] = [
        ConfoundKind::Motion,
        ConfoundKind::WhiteMatter,
        ConfoundKind::Csf,
        ConfoundKind::GlobalSignal,
        ConfoundKind::Acompcor,
    ];

    /// Key used for this kind in pipeline documents.
    pub fn key(&self) -> &'static str {
        match self {
            ConfoundKind::Motion => "motion",
            ConfoundKind::WhiteMatter => "whiteMatter",
            ConfoundKind::Csf => "csf",
            ConfoundKind::GlobalSignal => "globalSignal",
            ConfoundKind::Acompcor => "acompcor",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for ConfoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Expansion flags for one enabled confound kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfoundOptions {
    pub temporal_derivative: bool,
    /// Only takes effect together with `temporal_derivative`.
    pub quadratic_term: bool,
}

/// The enabled confound kinds and their expansions. Absent kinds are disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfoundSelection(BTreeMap<ConfoundKind, ConfoundOptions>);

impl ConfoundSelection {
    pub(super) fn enable(&mut self, kind: ConfoundKind, options: ConfoundOptions) {
        self.0.insert(kind, options);
    }

    pub fn is_enabled(&self, kind: ConfoundKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn options(&self, kind: ConfoundKind) -> Option<&ConfoundOptions> {
        self.0.get(&kind)
    }

    /// Enabled kinds in the fixed column-layout order.
    pub fn enabled(&self) -> impl Iterator<Item = (ConfoundKind, &ConfoundOptions)> {
        self.0.iter().map(|(kind, options)| (*kind, options))
    }
}

/// Outlier thresholds for spike regressors. A `None` or zero threshold flags nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpikeConfig {
    pub fd_th: Option<f64>,
    pub dvars_th: Option<f64>,
}

/// A validated denoising pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    name: String,
    description: Option<String>,
    confounds: ConfoundSelection,
    spikes: Option<SpikeConfig>,
    aroma: bool,
}

impl PipelineConfig {
    pub(super) fn new(
        name: String,
        description: Option<String>,
        confounds: ConfoundSelection,
        spikes: Option<SpikeConfig>,
        aroma: bool,
    ) -> Self {
        Self {
            name,
            description,
            confounds,
            spikes,
            aroma,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn confounds(&self) -> &ConfoundSelection {
        &self.confounds
    }

    /// `None` when spikes are disabled (`"spikes": false`).
    pub fn spikes(&self) -> Option<&SpikeConfig> {
        self.spikes.as_ref()
    }

    /// Whether the ICA-AROMA preprocessed recording is used.
    pub fn aroma(&self) -> bool {
        self.aroma
    }

    pub fn uses_acompcor(&self) -> bool {
        self.confounds.is_enabled(ConfoundKind::Acompcor)
    }
}
