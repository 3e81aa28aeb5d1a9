// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Signal cleaning: temporal filtering, confound regression, smoothing and the
//! denoised artifact store.

mod artifact;
mod clean;
mod denoiser;
mod filter;
mod smooth;
mod volume;

pub use artifact::{artifact_path, ArtifactOutcome, ArtifactStore};
pub use clean::{detrend, CleanParams, NuisanceCleaner, SignalCleaner};
pub use denoiser::{DenoiseJob, Denoiser};
pub use filter::BandFilter;
pub use smooth::smooth;
pub use volume::SignalVolume;
