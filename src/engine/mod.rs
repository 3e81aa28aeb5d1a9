// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stage graph execution: typed ports, graph validation, fan-out / join expansion and
//! the concurrent executor.

pub mod cache;
pub mod context;
pub mod executor;
pub mod graph;
pub mod join;
pub mod port;
pub mod state;


pub use cache::StageCache;
pub use context::{Iteration, IterationContext};
pub use executor::{ExecutionReport, InstanceKey, InstanceRecord, WorkflowExecutor};
pub use graph::{GraphBuilder, Scope, StageGraph};
pub use join::JoinGroup;
pub use port::{PortBindings, PortKind, PortShape, PortSpec, PortValue};
pub use state::NodeState;
