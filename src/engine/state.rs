// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::fmt;

/// Lifecycle of one stage instance.
///
/// `Pending → Ready → Running → {Completed | Cached | Failed}`; instances whose inputs
/// come from a failed upstream, or whose branch was aborted, go straight from
/// `Pending`/`Ready` to `Failed` without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Ready,
    Running,
    Completed,
    Cached,
    Failed,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Cached | NodeState::Failed)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Cached)
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Failed)
                | (Ready, Running)
                | (Ready, Failed)
                | (Running, Completed)
                | (Running, Cached)
                | (Running, Failed)
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Pending => "pending",
            NodeState::Ready => "ready",
            NodeState::Running => "running",
            NodeState::Completed => "completed",
            NodeState::Cached => "cached",
            NodeState::Failed => "failed",
        };
        f.write_str(name)
    }
}
