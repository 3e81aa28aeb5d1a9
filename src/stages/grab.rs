// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::dataset::{DatasetProvider, DatasetQuery};
use crate::engine::{IterationContext, PortBindings, PortKind, PortSpec, PortValue};
use crate::errors::StageError;
use crate::stages::blocking;
use crate::traits::Stage;

pub const SIGNALS_PORT: &str = "signals";
pub const AROMA_SIGNALS_PORT: &str = "aroma_signals";
pub const CONFOUNDS_PORT: &str = "confounds";
pub const ENTITIES_PORT: &str = "entities";
pub const TR_REGISTRY_PORT: &str = "tr_registry";

/// Indexes the dataset once for the whole run.
pub struct DatasetGrab {
    provider: Arc<dyn DatasetProvider>,
    query: DatasetQuery,
}

impl DatasetGrab {
    pub fn new(provider: Arc<dyn DatasetProvider>, query: DatasetQuery) -> Self {
        Self { provider, query }
    }
}

#[async_trait]
impl Stage for DatasetGrab {
    fn name(&self) -> &'static str {
        "dataset_grab"
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::list(SIGNALS_PORT, PortKind::Path),
            PortSpec::list(AROMA_SIGNALS_PORT, PortKind::OptionalPath),
            PortSpec::list(CONFOUNDS_PORT, PortKind::Path),
            PortSpec::list(ENTITIES_PORT, PortKind::Entities),
            PortSpec::single(TR_REGISTRY_PORT, PortKind::TrRegistry),
        ]
    }

    async fn run(
        &self,
        _ctx: &IterationContext,
        _inputs: PortBindings,
    ) -> Result<PortBindings, StageError> {
        let provider = self.provider.clone();
        let query = self.query.clone();
        let index = blocking(move || Ok(provider.grab(&query)?)).await?;

        Ok(PortBindings::new()
            .with(
                SIGNALS_PORT,
                PortValue::List(index.signals.into_iter().map(PortValue::Path).collect()),
            )
            .with(
                AROMA_SIGNALS_PORT,
                PortValue::List(
                    index
                        .aroma_signals
                        .into_iter()
                        .map(PortValue::OptionalPath)
                        .collect(),
                ),
            )
            .with(
                CONFOUNDS_PORT,
                PortValue::List(index.confounds.into_iter().map(PortValue::Path).collect()),
            )
            .with(
                ENTITIES_PORT,
                PortValue::List(index.entities.into_iter().map(PortValue::Entities).collect()),
            )
            .with(
                TR_REGISTRY_PORT,
                PortValue::TrRegistry(Arc::new(index.tr_registry)),
            ))
    }

    // The dataset on disk may change between runs.
    fn cacheable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ManifestDataset;
    use crate::errors::MissingDataError;
    use crate::stages::fixtures::{write_dataset, TR};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publishes_parallel_lists() {
        let dir = TempDir::new().unwrap();
        let manifest = write_dataset(dir.path(), &[("01", 0.05), ("02", 0.05)], false);
        let grab = DatasetGrab::new(
            Arc::new(ManifestDataset::open(&manifest).unwrap()),
            DatasetQuery::default(),
        );

        let outputs = grab
            .run(&IterationContext::shared(), PortBindings::new())
            .await
            .unwrap();

        assert_eq!(outputs.path_list(SIGNALS_PORT).unwrap().len(), 2);
        assert_eq!(outputs.list(CONFOUNDS_PORT).unwrap().len(), 2);
        assert_eq!(
            outputs.list(AROMA_SIGNALS_PORT).unwrap()[0],
            PortValue::OptionalPath(None)
        );
        assert_eq!(outputs.tr_registry(TR_REGISTRY_PORT).unwrap().get("rest"), Some(TR));
    }

    #[tokio::test]
    async fn test_missing_aroma_variant_is_a_stage_error() {
        let dir = TempDir::new().unwrap();
        let manifest = write_dataset(dir.path(), &[("01", 0.05)], false);
        let query = DatasetQuery {
            require_aroma: true,
            ..DatasetQuery::default()
        };
        let grab = DatasetGrab::new(Arc::new(ManifestDataset::open(&manifest).unwrap()), query);

        let result = grab
            .run(&IterationContext::shared(), PortBindings::new())
            .await;

        assert!(matches!(
            result,
            Err(StageError::MissingData(MissingDataError::AromaVariant { .. }))
        ));
    }
}
