// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline document validation.
//!
//! Documents follow a fixed schema:
//!
//! ```json
//! {
//!   "name": "24HMP_8Phys_SpikeReg",
//!   "description": "optional free text",
//!   "confounds": {
//!     "motion": {"temporalDerivative": true, "quadraticTerm": "true"},
//!     "whiteMatter": true,
//!     "csf": false,
//!     "acompcor": "False"
//!   },
//!   "spikes": {"fd_th": 0.5, "dvars_th": false},
//!   "aroma": false
//! }
//! ```
//!
//! Validation is a pure function of the document. Boolean-like leaves (native booleans
//! or case-insensitive `"true"`/`"false"` strings) are normalized; any other value in a
//! boolean slot is rejected.
//!
//! # Example
//! ```rust
//! use rsfmri_denoise::config::{validate, ConfoundKind};
//! use serde_json::json;
//!
//! let pipeline = validate(&json!({
//!     "name": "motion-only",
//!     "confounds": {"motion": {"temporalDerivative": "TRUE"}},
//!     "spikes": false,
//!     "aroma": "false"
//! })).unwrap();
//!
//! assert!(pipeline.confounds().is_enabled(ConfoundKind::Motion));
//! assert!(!pipeline.aroma());
//! ```

use serde_json::{Map, Value};
use std::path::Path;

use crate::config::consts::{KEY_AROMA, KEY_CONFOUNDS, KEY_DESCRIPTION, KEY_NAME, KEY_SPIKES};
use crate::config::pipeline::{ConfoundOptions, ConfoundSelection, PipelineConfig, SpikeConfig};
use crate::config::ConfoundKind;
use crate::errors::ValidationError;

const REQUIRED_KEYS: [&str; 4] = [KEY_NAME, KEY_CONFOUNDS, KEY_SPIKES, KEY_AROMA];
const SPIKE_KEYS: [&str; 2] = ["fd_th", "dvars_th"];

/// Validate a pipeline document and produce a normalized [`PipelineConfig`].
pub fn validate(doc: &Value) -> Result<PipelineConfig, ValidationError> {
    let root = as_object(doc, "<root>")?;

    for key in REQUIRED_KEYS {
        if !root.contains_key(key) {
            return Err(ValidationError::MissingKey {
                key: key.to_string(),
            });
        }
    }
    for key in root.keys() {
        if !REQUIRED_KEYS.contains(&key.as_str()) && key != KEY_DESCRIPTION {
            return Err(ValidationError::UnknownKey { path: key.clone() });
        }
    }

    let name = match &root[KEY_NAME] {
        Value::String(name) if !name.trim().is_empty() => name.clone(),
        other => {
            return Err(ValidationError::InvalidName {
                value: other.to_string(),
            })
        }
    };

    let description = match root.get(KEY_DESCRIPTION) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            return Err(ValidationError::UnknownKey {
                path: format!("{}={}", KEY_DESCRIPTION, other),
            })
        }
    };

    let confounds = validate_confounds(&root[KEY_CONFOUNDS])?;
    let spikes = validate_spikes(&root[KEY_SPIKES])?;
    let aroma = boolean_like(&root[KEY_AROMA], KEY_AROMA)?;

    Ok(PipelineConfig::new(name, description, confounds, spikes, aroma))
}

/// Load and validate a pipeline from a file path or an in-memory JSON literal.
///
/// A source whose first non-whitespace character is `{` is parsed directly; anything
/// else is treated as a path.
pub fn load_pipeline(source: &str) -> Result<PipelineConfig, ValidationError> {
    let trimmed = source.trim_start();
    let text = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        let path = Path::new(source);
        std::fs::read_to_string(path).map_err(|e| ValidationError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    };

    let doc: Value =
        serde_json::from_str(&text).map_err(|e| ValidationError::Parse(e.to_string()))?;
    validate(&doc)
}

fn validate_confounds(value: &Value) -> Result<ConfoundSelection, ValidationError> {
    let section = as_object(value, KEY_CONFOUNDS)?;
    let mut selection = ConfoundSelection::default();

    for (key, setting) in section {
        let kind = ConfoundKind::from_key(key).ok_or_else(|| ValidationError::UnknownConfoundKind {
            kind: key.clone(),
        })?;
        let path = format!("{}.{}", KEY_CONFOUNDS, key);

        match setting {
            Value::Object(flags) => {
                let mut options = ConfoundOptions::default();
                for (flag, flag_value) in flags {
                    let flag_path = format!("{}.{}", path, flag);
                    match flag.as_str() {
                        "temporalDerivative" => {
                            options.temporal_derivative = boolean_like(flag_value, &flag_path)?
                        }
                        "quadraticTerm" => {
                            options.quadratic_term = boolean_like(flag_value, &flag_path)?
                        }
                        _ => return Err(ValidationError::UnknownKey { path: flag_path }),
                    }
                }
                selection.enable(kind, options);
            }
            other => {
                if boolean_like(other, &path)? {
                    selection.enable(kind, ConfoundOptions::default());
                }
            }
        }
    }

    Ok(selection)
}

fn validate_spikes(value: &Value) -> Result<Option<SpikeConfig>, ValidationError> {
    let section = match value {
        Value::Object(section) => section,
        other => {
            // Only an explicit false disables spikes; `true` carries no thresholds.
            return match boolean_like(other, KEY_SPIKES)? {
                false => Ok(None),
                true => Err(ValidationError::InvalidThreshold {
                    path: KEY_SPIKES.to_string(),
                    value: other.to_string(),
                }),
            };
        }
    };

    for key in section.keys() {
        if !SPIKE_KEYS.contains(&key.as_str()) {
            return Err(ValidationError::UnknownKey {
                path: format!("{}.{}", KEY_SPIKES, key),
            });
        }
    }

    Ok(Some(SpikeConfig {
        fd_th: threshold(section, "fd_th")?,
        dvars_th: threshold(section, "dvars_th")?,
    }))
}

fn threshold(section: &Map<String, Value>, key: &str) -> Result<Option<f64>, ValidationError> {
    let path = format!("{}.{}", KEY_SPIKES, key);
    match section.get(key) {
        None => Ok(None),
        Some(Value::Number(number)) => match number.as_f64() {
            // zero disables the criterion
            Some(th) if th == 0.0 => Ok(None),
            Some(th) if th.is_finite() => Ok(Some(th)),
            _ => Err(ValidationError::InvalidThreshold {
                path,
                value: number.to_string(),
            }),
        },
        Some(other) => match parse_boolean_like(other) {
            Some(false) => Ok(None),
            _ => Err(ValidationError::InvalidThreshold {
                path,
                value: other.to_string(),
            }),
        },
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError::NotAnObject {
        path: path.to_string(),
    })
}

fn parse_boolean_like(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
        Value::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn boolean_like(value: &Value, path: &str) -> Result<bool, ValidationError> {
    parse_boolean_like(value).ok_or_else(|| ValidationError::NotBooleanLike {
        path: path.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_doc() -> Value {
        json!({
            "name": "A",
            "confounds": {"motion": {"temporalDerivative": true, "quadraticTerm": true}},
            "spikes": false,
            "aroma": false
        })
    }

    #[test]
    fn test_valid_document_is_normalized() {
        let doc = json!({
            "name": "mixed",
            "description": "string booleans everywhere",
            "confounds": {
                "motion": {"temporalDerivative": "True", "quadraticTerm": "FALSE"},
                "whiteMatter": "true",
                "csf": false,
                "acompcor": "false"
            },
            "spikes": {"fd_th": 0.5, "dvars_th": "false"},
            "aroma": "TRUE"
        });

        let pipeline = validate(&doc).expect("document should validate");

        assert_eq!(pipeline.name(), "mixed");
        assert_eq!(pipeline.description(), Some("string booleans everywhere"));
        assert!(pipeline.aroma());
        let motion = pipeline.confounds().options(ConfoundKind::Motion).unwrap();
        assert!(motion.temporal_derivative);
        assert!(!motion.quadratic_term);
        assert!(pipeline.confounds().is_enabled(ConfoundKind::WhiteMatter));
        assert!(!pipeline.confounds().is_enabled(ConfoundKind::Csf));
        assert!(!pipeline.uses_acompcor());
        let spikes = pipeline.spikes().unwrap();
        assert_eq!(spikes.fd_th, Some(0.5));
        assert_eq!(spikes.dvars_th, None);
    }

    #[test]
    fn test_enabled_kinds_follow_fixed_order() {
        let doc = json!({
            "name": "order",
            "confounds": {"acompcor": true, "csf": true, "motion": true, "globalSignal": true},
            "spikes": false,
            "aroma": false
        });
        let pipeline = validate(&doc).unwrap();
        let kinds: Vec<ConfoundKind> = pipeline.confounds().enabled().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                ConfoundKind::Motion,
                ConfoundKind::Csf,
                ConfoundKind::GlobalSignal,
                ConfoundKind::Acompcor
            ]
        );
    }

    #[test]
    fn test_missing_required_key() {
        for key in REQUIRED_KEYS {
            let mut doc = base_doc();
            doc.as_object_mut().unwrap().remove(key);
            assert_eq!(
                validate(&doc),
                Err(ValidationError::MissingKey { key: key.to_string() })
            );
        }
    }

    #[test]
    fn test_unknown_confound_kind() {
        let mut doc = base_doc();
        doc["confounds"]["gs"] = json!(true);
        assert_eq!(
            validate(&doc),
            Err(ValidationError::UnknownConfoundKind { kind: "gs".to_string() })
        );
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let mut doc = base_doc();
        doc["confounds"]["motion"]["cubicTerm"] = json!(true);
        assert!(matches!(validate(&doc), Err(ValidationError::UnknownKey { .. })));
    }

    #[test]
    fn test_non_boolean_values_are_rejected() {
        let mut doc = base_doc();
        doc["aroma"] = json!("yes");
        assert!(matches!(validate(&doc), Err(ValidationError::NotBooleanLike { .. })));

        let mut doc = base_doc();
        doc["confounds"]["csf"] = json!(1);
        assert!(matches!(validate(&doc), Err(ValidationError::NotBooleanLike { .. })));
    }

    #[test]
    fn test_spike_thresholds() {
        let mut doc = base_doc();
        doc["spikes"] = json!({"fd_th": "high"});
        assert!(matches!(validate(&doc), Err(ValidationError::InvalidThreshold { .. })));

        let mut doc = base_doc();
        doc["spikes"] = json!({"fd_th": false, "dvars_th": 3});
        let spikes = *validate(&doc).unwrap().spikes().unwrap();
        assert_eq!(spikes.fd_th, None);
        assert_eq!(spikes.dvars_th, Some(3.0));

        let mut doc = base_doc();
        doc["spikes"] = json!("False");
        assert!(validate(&doc).unwrap().spikes().is_none());

        let mut doc = base_doc();
        doc["spikes"] = json!(true);
        assert!(matches!(validate(&doc), Err(ValidationError::InvalidThreshold { .. })));
    }

    #[test]
    fn test_zero_threshold_disables_its_criterion() {
        let mut doc = base_doc();
        doc["spikes"] = json!({"fd_th": 0, "dvars_th": 0.0});
        let spikes = *validate(&doc).unwrap().spikes().unwrap();
        assert_eq!(spikes.fd_th, None);
        assert_eq!(spikes.dvars_th, None);

        let mut doc = base_doc();
        doc["spikes"] = json!({"fd_th": 0, "dvars_th": 1.5});
        let spikes = *validate(&doc).unwrap().spikes().unwrap();
        assert_eq!(spikes.fd_th, None);
        assert_eq!(spikes.dvars_th, Some(1.5));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut doc = base_doc();
        doc["name"] = json!("  ");
        assert!(matches!(validate(&doc), Err(ValidationError::InvalidName { .. })));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let doc = base_doc();
        assert_eq!(validate(&doc), validate(&doc));
    }

    #[test]
    fn test_load_pipeline_from_literal_and_file() {
        let literal = r#"{"name": "lit", "confounds": {}, "spikes": false, "aroma": "false"}"#;
        assert_eq!(load_pipeline(literal).unwrap().name(), "lit");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline-lit.json");
        std::fs::write(&path, literal).unwrap();
        assert_eq!(load_pipeline(path.to_str().unwrap()).unwrap().name(), "lit");

        assert!(matches!(
            load_pipeline(dir.path().join("missing.json").to_str().unwrap()),
            Err(ValidationError::Unreadable { .. })
        ));
    }
}
