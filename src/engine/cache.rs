// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::engine::PortBindings;

/// SHA-256 of a node name, its stage fingerprint and its resolved inputs, hex encoded.
pub type CacheKey = String;

/// Stage results keyed by what produced them.
///
/// Shared across runs of the same executor, so a rerun with unchanged inputs answers
/// every cacheable instance without running it.
#[derive(Debug, Default)]
pub struct StageCache {
    entries: RwLock<HashMap<CacheKey, PortBindings>>,
}

impl StageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for `node` given its stage fingerprint and resolved inputs, or `None`
    /// when the inputs cannot be serialized.
    pub fn key(node: &str, fingerprint: Option<&str>, inputs: &PortBindings) -> Option<CacheKey> {
        let encoded = serde_json::to_vec(inputs).ok()?;
        let mut hasher = Sha256::new();
        hasher.update(node.as_bytes());
        hasher.update([0u8]);
        if let Some(fingerprint) = fingerprint {
            hasher.update(fingerprint.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(&encoded);
        Some(hex::encode(hasher.finalize()))
    }

    pub fn get(&self, key: &str) -> Option<PortBindings> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, outputs: PortBindings) {
        self.entries.write().insert(key, outputs);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PortValue;
    use std::path::PathBuf;

    fn inputs(path: &str) -> PortBindings {
        PortBindings::new().with("signal", PortValue::Path(PathBuf::from(path)))
    }

    #[test]
    fn test_key_depends_on_node_and_inputs() {
        let a = StageCache::key("denoise", None, &inputs("a.json")).unwrap();
        assert_eq!(a, StageCache::key("denoise", None, &inputs("a.json")).unwrap());
        assert_ne!(a, StageCache::key("denoise", None, &inputs("b.json")).unwrap());
        assert_ne!(a, StageCache::key("confound_prep", None, &inputs("a.json")).unwrap());
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_key_depends_on_fingerprint() {
        let plain = StageCache::key("denoise", None, &inputs("a.json")).unwrap();
        let a = StageCache::key("denoise", Some("out-a"), &inputs("a.json")).unwrap();
        let b = StageCache::key("denoise", Some("out-b"), &inputs("a.json")).unwrap();

        assert_ne!(plain, a);
        assert_ne!(a, b);
        assert_eq!(a, StageCache::key("denoise", Some("out-a"), &inputs("a.json")).unwrap());
    }

    #[test]
    fn test_insert_and_get() {
        let cache = StageCache::new();
        let key = StageCache::key("denoise", None, &inputs("a.json")).unwrap();
        assert!(cache.get(&key).is_none());

        cache.insert(key.clone(), inputs("out.json"));
        assert_eq!(cache.get(&key), Some(inputs("out.json")));
        assert_eq!(cache.len(), 1);
    }
}
