// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::{IterationContext, PortBindings, PortSpec};
use crate::errors::StageError;

/// A unit of work in the stage graph.
///
/// A stage never references other stages; it declares typed ports and the executor
/// binds them. One stage value serves every instance of its node, so `run` must not
/// keep per-instance state.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn inputs(&self) -> Vec<PortSpec>;

    fn outputs(&self) -> Vec<PortSpec>;

    async fn run(
        &self,
        ctx: &IterationContext,
        inputs: PortBindings,
    ) -> Result<PortBindings, StageError>;

    /// Whether identical resolved inputs may be answered from the stage cache.
    fn cacheable(&self) -> bool {
        true
    }

    /// Configuration held by the stage itself that changes what `run` produces for the
    /// same inputs. It is part of the cache key.
    fn fingerprint(&self) -> Option<String> {
        None
    }
}
