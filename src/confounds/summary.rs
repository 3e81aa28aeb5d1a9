// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::config::consts::{EXCLUSION_MAX_FD_MM, EXCLUSION_MEAN_FD_MM, EXCLUSION_SPIKE_PERCENT};
use crate::confounds::builder::FD_COLUMN;
use crate::confounds::{ConfoundTable, RegressorMatrix};
use crate::errors::StageFailure;

/// Per-subject quality-control numbers for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfoundSummary {
    pub subject: String,
    pub n_timepoints: usize,
    pub n_regressors: usize,
    pub n_spikes: usize,
    pub spike_percent: f64,
    /// `None` when the table has no framewise displacement column.
    pub mean_fd: Option<f64>,
    pub max_fd: Option<f64>,
    /// Share of temporal degrees of freedom spent on regressors.
    pub dof_loss: f64,
}

impl ConfoundSummary {
    pub fn from_table(subject: &str, table: &ConfoundTable, regressors: &RegressorMatrix) -> Self {
        let n_timepoints = table.n_timepoints();
        let fd: Vec<f64> = table
            .column(FD_COLUMN)
            .map(|values| values.iter().copied().filter(|v| v.is_finite()).collect())
            .unwrap_or_default();
        let (mean_fd, max_fd) = if fd.is_empty() {
            (None, None)
        } else {
            (
                Some(fd.iter().sum::<f64>() / fd.len() as f64),
                fd.iter().copied().reduce(f64::max),
            )
        };

        let n_spikes = regressors.spike_count();
        let ratio = |count: usize| {
            if n_timepoints == 0 {
                0.0
            } else {
                count as f64 / n_timepoints as f64
            }
        };

        Self {
            subject: subject.to_string(),
            n_timepoints,
            n_regressors: regressors.n_columns(),
            n_spikes,
            spike_percent: 100.0 * ratio(n_spikes),
            mean_fd,
            max_fd,
            dof_loss: ratio(regressors.n_columns()),
        }
    }
}

/// High-motion exclusion thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExclusionCriteria {
    pub mean_fd_mm: f64,
    pub max_fd_mm: f64,
    pub spike_percent: f64,
}

impl Default for ExclusionCriteria {
    fn default() -> Self {
        Self {
            mean_fd_mm: EXCLUSION_MEAN_FD_MM,
            max_fd_mm: EXCLUSION_MAX_FD_MM,
            spike_percent: EXCLUSION_SPIKE_PERCENT,
        }
    }
}

impl ExclusionCriteria {
    /// Why a subject should be excluded, if it should.
    pub fn exclusion_reason(&self, summary: &ConfoundSummary) -> Option<String> {
        if let Some(mean_fd) = summary.mean_fd.filter(|fd| *fd > self.mean_fd_mm) {
            return Some(format!(
                "mean framewise displacement {:.3} mm exceeds {} mm",
                mean_fd, self.mean_fd_mm
            ));
        }
        if let Some(max_fd) = summary.max_fd.filter(|fd| *fd > self.max_fd_mm) {
            return Some(format!(
                "framewise displacement peak {:.3} mm exceeds {} mm",
                max_fd, self.max_fd_mm
            ));
        }
        if summary.spike_percent > self.spike_percent {
            return Some(format!(
                "{:.1}% of volumes flagged as spikes, limit {}%",
                summary.spike_percent, self.spike_percent
            ));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedSubject {
    pub subject: String,
    pub reason: String,
}

/// Group-level result of one pipeline: the join over all of its subjects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupConfoundSummary {
    pub pipeline: String,
    pub included: Vec<ConfoundSummary>,
    pub excluded: Vec<ExcludedSubject>,
    pub failures: Vec<StageFailure>,
    pub mean_dof_loss: Option<f64>,
    pub mean_post_clean_dvars: Option<f64>,
}

/// One subject's entry in a group join.
#[derive(Debug, Clone)]
pub struct SubjectEntry {
    pub summary: Result<ConfoundSummary, StageFailure>,
    /// Mean DVARS of the cleaned recording, when it was computed.
    pub post_clean_dvars: Option<f64>,
}

impl GroupConfoundSummary {
    /// Aggregate per-subject entries, given in subject order.
    pub fn aggregate(pipeline: &str, entries: Vec<SubjectEntry>, criteria: &ExclusionCriteria) -> Self {
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut failures = Vec::new();
        let mut dvars = Vec::new();

        for entry in entries {
            match entry.summary {
                Err(failure) => failures.push(failure),
                Ok(summary) => match criteria.exclusion_reason(&summary) {
                    Some(reason) => excluded.push(ExcludedSubject {
                        subject: summary.subject,
                        reason,
                    }),
                    None => {
                        dvars.extend(entry.post_clean_dvars);
                        included.push(summary);
                    }
                },
            }
        }

        Self {
            pipeline: pipeline.to_string(),
            mean_dof_loss: mean(included.iter().map(|s| s.dof_loss)),
            mean_post_clean_dvars: mean(dvars.into_iter()),
            included,
            excluded,
            failures,
        }
    }
}

/// One row of the cross-pipeline comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub pipeline: String,
    pub n_included: usize,
    pub n_excluded: usize,
    pub n_failed: usize,
    pub mean_dof_loss: Option<f64>,
    pub mean_post_clean_dvars: Option<f64>,
    /// Set when the whole pipeline branch failed before its group summary existed.
    pub failure: Option<String>,
}

impl From<&GroupConfoundSummary> for ComparisonRow {
    fn from(group: &GroupConfoundSummary) -> Self {
        Self {
            pipeline: group.pipeline.clone(),
            n_included: group.included.len(),
            n_excluded: group.excluded.len(),
            n_failed: group.failures.len(),
            mean_dof_loss: group.mean_dof_loss,
            mean_post_clean_dvars: group.mean_post_clean_dvars,
            failure: None,
        }
    }
}

impl ComparisonRow {
    pub fn failed(pipeline: &str, failure: &StageFailure) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            n_included: 0,
            n_excluded: 0,
            n_failed: 0,
            mean_dof_loss: None,
            mean_post_clean_dvars: None,
            failure: Some(failure.to_string()),
        }
    }
}

/// Group summaries of every pipeline, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineComparison {
    pub rows: Vec<ComparisonRow>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;
    use crate::confounds::build;
    use crate::engine::IterationContext;
    use crate::errors::StageError;
    use serde_json::json;

    fn summary(subject: &str, mean_fd: f64, spike_percent: f64, dof_loss: f64) -> ConfoundSummary {
        ConfoundSummary {
            subject: subject.to_string(),
            n_timepoints: 100,
            n_regressors: 10,
            n_spikes: 0,
            spike_percent,
            mean_fd: Some(mean_fd),
            max_fd: Some(mean_fd * 2.0),
            dof_loss,
        }
    }

    #[test]
    fn test_summary_from_table() {
        let table = ConfoundTable::from_columns(vec![
            (FD_COLUMN, vec![f64::NAN, 0.2, 0.8, 0.2]),
            ("csf", vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap();
        let pipeline = validate(&json!({
            "name": "A",
            "confounds": {"csf": true},
            "spikes": {"fd_th": 0.5},
            "aroma": false
        }))
        .unwrap();
        let regressors = build(&table, &pipeline).unwrap();

        let summary = ConfoundSummary::from_table("sub-01", &table, &regressors);

        assert_eq!(summary.n_regressors, 2);
        assert_eq!(summary.n_spikes, 1);
        assert_eq!(summary.spike_percent, 25.0);
        assert_eq!(summary.max_fd, Some(0.8));
        assert!((summary.mean_fd.unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(summary.dof_loss, 0.5);
    }

    #[test]
    fn test_aggregate_separates_included_excluded_and_failed() {
        let failure = StageFailure::raised(
            "denoise",
            &IterationContext::default(),
            &StageError::Other("boom".to_string()),
        );
        let entries = vec![
            SubjectEntry {
                summary: Ok(summary("sub-01", 0.1, 0.0, 0.2)),
                post_clean_dvars: Some(1.0),
            },
            SubjectEntry {
                summary: Ok(summary("sub-02", 0.5, 0.0, 0.2)),
                post_clean_dvars: Some(9.0),
            },
            SubjectEntry {
                summary: Err(failure.clone()),
                post_clean_dvars: None,
            },
            SubjectEntry {
                summary: Ok(summary("sub-04", 0.1, 0.0, 0.4)),
                post_clean_dvars: Some(3.0),
            },
        ];

        let group = GroupConfoundSummary::aggregate("A", entries, &ExclusionCriteria::default());

        assert_eq!(group.included.len(), 2);
        assert_eq!(group.excluded.len(), 1);
        assert_eq!(group.excluded[0].subject, "sub-02");
        assert_eq!(group.failures, vec![failure]);
        assert!((group.mean_dof_loss.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(group.mean_post_clean_dvars, Some(2.0));
    }

    #[test]
    fn test_spike_percent_exclusion() {
        let criteria = ExclusionCriteria::default();
        assert!(criteria.exclusion_reason(&summary("s", 0.1, 25.0, 0.1)).is_some());
        assert!(criteria.exclusion_reason(&summary("s", 0.1, 5.0, 0.1)).is_none());
    }
}
