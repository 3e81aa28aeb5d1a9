// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::{IterationContext, PortBindings, PortKind, PortSpec, PortValue};
use crate::errors::StageError;
use crate::signal::SignalVolume;
use crate::stages::blocking;
use crate::traits::Stage;

pub const DENOISED_PORT: &str = "denoised";
pub const DVARS_PORT: &str = "dvars";

/// Mean DVARS of a cleaned recording.
pub struct SignalQuality;

#[async_trait]
impl Stage for SignalQuality {
    fn name(&self) -> &'static str {
        "signal_quality"
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::single(DENOISED_PORT, PortKind::Path)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::single(DVARS_PORT, PortKind::Measure)]
    }

    async fn run(
        &self,
        _ctx: &IterationContext,
        inputs: PortBindings,
    ) -> Result<PortBindings, StageError> {
        let path = inputs.path(DENOISED_PORT)?;
        let dvars = blocking(move || Ok(SignalVolume::load(&path)?.mean_dvars())).await?;
        Ok(PortBindings::new().with(DVARS_PORT, PortValue::Measure(dvars)))
    }
}
