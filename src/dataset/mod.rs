// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dataset access: recordings, their confound tables, entities and repetition times.

mod entities;
mod manifest;

pub use entities::{Entities, TrRegistry};
pub use manifest::{DatasetIndex, DatasetProvider, DatasetQuery, ManifestDataset};
