// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity keys that lead a label, with their short prefixes.
const LABEL_ORDER: [(&str, &str); 4] = [
    ("subject", "sub"),
    ("session", "ses"),
    ("task", "task"),
    ("run", "run"),
];

/// Entity dictionary of one recording (`subject`, `session`, `task`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entities(BTreeMap<String, String>);

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("subject")
    }

    pub fn session(&self) -> Option<&str> {
        self.get("session")
    }

    pub fn task(&self) -> Option<&str> {
        self.get("task")
    }

    /// Stable label such as `sub-01_ses-1_task-rest`.
    ///
    /// Well-known entities come first in a fixed order, the rest follow sorted by key.
    pub fn label(&self) -> String {
        let known = LABEL_ORDER
            .iter()
            .filter_map(|(key, prefix)| self.get(key).map(|value| format!("{}-{}", prefix, value)));
        let others = self
            .0
            .iter()
            .filter(|(key, _)| !LABEL_ORDER.iter().any(|(known, _)| known == key))
            .map(|(key, value)| format!("{}-{}", key, value));
        known.chain(others).collect::<Vec<_>>().join("_")
    }
}

/// Repetition time in seconds, keyed by task name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrRegistry(BTreeMap<String, f64>);

impl TrRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, task: &str, tr: f64) -> Self {
        self.insert(task, tr);
        self
    }

    pub fn insert(&mut self, task: &str, tr: f64) {
        self.0.insert(task.to_string(), tr);
    }

    pub fn get(&self, task: &str) -> Option<f64> {
        self.0.get(task).copied()
    }
}
