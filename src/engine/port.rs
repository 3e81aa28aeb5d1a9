// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed stage ports and the values that flow along edges.
//!
//! Every stage declares its input and output ports up front. Edges are checked against
//! these declarations when the graph is built, so a stage only ever sees the value kinds
//! it asked for. Values are plain data (cheaply cloned through `Arc` where large) and
//! serializable, which is what makes them usable as stage-cache keys.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::confounds::{ConfoundSummary, GroupConfoundSummary, RegressorMatrix};
use crate::dataset::{Entities, TrRegistry};
use crate::errors::{StageError, StageFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Pipeline,
    Path,
    OptionalPath,
    Entities,
    TrRegistry,
    Regressors,
    ConfoundSummary,
    GroupSummary,
    Measure,
    Json,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortKind::Pipeline => "pipeline",
            PortKind::Path => "path",
            PortKind::OptionalPath => "optional_path",
            PortKind::Entities => "entities",
            PortKind::TrRegistry => "tr_registry",
            PortKind::Regressors => "regressors",
            PortKind::ConfoundSummary => "confound_summary",
            PortKind::GroupSummary => "group_summary",
            PortKind::Measure => "measure",
            PortKind::Json => "json",
        };
        f.write_str(name)
    }
}

/// Whether a port carries one value or an ordered list of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortShape {
    Single,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub name: &'static str,
    pub kind: PortKind,
    pub shape: PortShape,
}

impl PortSpec {
    pub const fn single(name: &'static str, kind: PortKind) -> Self {
        Self {
            name,
            kind,
            shape: PortShape::Single,
        }
    }

    pub const fn list(name: &'static str, kind: PortKind) -> Self {
        Self {
            name,
            kind,
            shape: PortShape::List,
        }
    }

    /// Type signature used in graph error messages, e.g. `list<path>`.
    pub fn signature(&self) -> String {
        match self.shape {
            PortShape::Single => self.kind.to_string(),
            PortShape::List => format!("list<{}>", self.kind),
        }
    }
}

/// A value on an edge.
///
/// `Failed` only ever appears as an element of a gathered join list: it stands in for an
/// iteration that did not produce a value, so the join still sees one slot per iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PortValue {
    Pipeline(Arc<PipelineConfig>),
    Path(PathBuf),
    OptionalPath(Option<PathBuf>),
    Entities(Entities),
    TrRegistry(Arc<TrRegistry>),
    Regressors(Arc<RegressorMatrix>),
    ConfoundSummary(ConfoundSummary),
    GroupSummary(Arc<GroupConfoundSummary>),
    Measure(Option<f64>),
    Json(serde_json::Value),
    List(Vec<PortValue>),
    Failed(StageFailure),
}

impl PortValue {
    pub fn is_failed(&self) -> bool {
        matches!(self, PortValue::Failed(_))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            PortValue::Pipeline(_) => "pipeline",
            PortValue::Path(_) => "path",
            PortValue::OptionalPath(_) => "optional_path",
            PortValue::Entities(_) => "entities",
            PortValue::TrRegistry(_) => "tr_registry",
            PortValue::Regressors(_) => "regressors",
            PortValue::ConfoundSummary(_) => "confound_summary",
            PortValue::GroupSummary(_) => "group_summary",
            PortValue::Measure(_) => "measure",
            PortValue::Json(_) => "json",
            PortValue::List(_) => "list",
            PortValue::Failed(_) => "failed",
        }
    }
}

/// Named port values, either the resolved inputs of an instance or its outputs.
///
/// Ordered by port name so the serialized form is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PortBindings(BTreeMap<String, PortValue>);

macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $out:ty) => {
        pub fn $fn_name(&self, port: &str) -> Result<$out, StageError> {
            match self.get(port)? {
                PortValue::$variant(value) => Ok(value.clone()),
                other => Err(unexpected(port, stringify!($fn_name), other)),
            }
        }
    };
}

impl PortBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, port: &str, value: PortValue) -> Self {
        self.insert(port, value);
        self
    }

    pub fn insert(&mut self, port: &str, value: PortValue) {
        self.0.insert(port.to_string(), value);
    }

    pub fn get(&self, port: &str) -> Result<&PortValue, StageError> {
        self.0
            .get(port)
            .ok_or_else(|| StageError::input(port, "is not bound"))
    }

    pub fn contains(&self, port: &str) -> bool {
        self.0.contains_key(port)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PortValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    typed_getter!(pipeline, Pipeline, Arc<PipelineConfig>);
    typed_getter!(path, Path, PathBuf);
    typed_getter!(optional_path, OptionalPath, Option<PathBuf>);
    typed_getter!(entities, Entities, Entities);
    typed_getter!(tr_registry, TrRegistry, Arc<TrRegistry>);
    typed_getter!(regressors, Regressors, Arc<RegressorMatrix>);
    typed_getter!(confound_summary, ConfoundSummary, ConfoundSummary);
    typed_getter!(group_summary, GroupSummary, Arc<GroupConfoundSummary>);
    typed_getter!(measure, Measure, Option<f64>);
    typed_getter!(json, Json, serde_json::Value);

    pub fn list(&self, port: &str) -> Result<&[PortValue], StageError> {
        match self.get(port)? {
            PortValue::List(values) => Ok(values),
            other => Err(unexpected(port, "list", other)),
        }
    }

    /// A gathered path list with every slot required to be present.
    pub fn path_list(&self, port: &str) -> Result<Vec<&Path>, StageError> {
        self.list(port)?
            .iter()
            .map(|value| match value {
                PortValue::Path(path) => Ok(path.as_path()),
                other => Err(unexpected(port, "path", other)),
            })
            .collect()
    }
}

impl FromIterator<(String, PortValue)> for PortBindings {
    fn from_iter<I: IntoIterator<Item = (String, PortValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn unexpected(port: &str, expected: &str, found: &PortValue) -> StageError {
    StageError::input(
        port,
        format!("expected {} but carries {}", expected, found.describe()),
    )
}
