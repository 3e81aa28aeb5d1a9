// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::DenoiseError;

/// Deterministic output location for a denoised recording.
///
/// `<dir>/<base>_denoised_pipeline-<pipeline>.json`, where `<base>` is the recording's
/// file name up to its first `.`.
pub fn artifact_path(output_dir: &Path, recording: &Path, pipeline: &str) -> PathBuf {
    let file_name = recording
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = file_name.split('.').next().unwrap_or_default();
    output_dir.join(format!("{}_denoised_pipeline-{}.json", base, pipeline))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Created(PathBuf),
    Reused(PathBuf),
}

impl ArtifactOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ArtifactOutcome::Created(path) | ArtifactOutcome::Reused(path) => path,
        }
    }
}

/// On-disk artifact store with per-path claims.
///
/// At most one writer produces a given path; concurrent callers for the same path wait
/// on the claim and then see the finished file. Writers fill a hidden sibling and rename
/// it into place, so a reader never observes a partial artifact. A claim is dropped once
/// no caller holds it.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    claims: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&self, path: &Path) -> Arc<Mutex<()>> {
        self.claims
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Drop the claim for `path` once no other caller holds it.
    fn release(&self, path: &Path, claim: &Arc<Mutex<()>>) {
        let mut claims = self.claims.lock();
        // one reference in the map, one held by the caller
        if Arc::strong_count(claim) == 2 {
            claims.remove(path);
        }
    }

    /// Return the existing artifact at `path`, or produce it with `create`.
    ///
    /// `create` receives the temporary path it must write to.
    pub fn create_or_reuse<F>(&self, path: &Path, create: F) -> Result<ArtifactOutcome, DenoiseError>
    where
        F: FnOnce(&Path) -> Result<(), DenoiseError>,
    {
        if path.exists() {
            return Ok(ArtifactOutcome::Reused(path.to_path_buf()));
        }

        let claim = self.claim(path);
        let outcome = {
            let _guard = claim.lock();
            produce(path, create)
        };
        self.release(path, &claim);
        outcome
    }
}

fn produce<F>(path: &Path, create: F) -> Result<ArtifactOutcome, DenoiseError>
where
    F: FnOnce(&Path) -> Result<(), DenoiseError>,
{
    if path.exists() {
        return Ok(ArtifactOutcome::Reused(path.to_path_buf()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DenoiseError::io(parent, e))?;
    }

    let partial = partial_path(path);
    if let Err(error) = create(&partial) {
        let _ = std::fs::remove_file(&partial);
        return Err(error);
    }
    std::fs::rename(&partial, path).map_err(|e| DenoiseError::io(path, e))?;

    Ok(ArtifactOutcome::Created(path.to_path_buf()))
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_artifact_path_uses_base_name_and_pipeline() {
        let path = artifact_path(
            Path::new("/out"),
            Path::new("/data/sub-01/func/sub-01_task-rest_space-MNI_desc-preproc_bold.nii.gz"),
            "24HMP_8Phys_SpikeReg",
        );
        assert_eq!(
            path,
            PathBuf::from(
                "/out/sub-01_task-rest_space-MNI_desc-preproc_bold_denoised_pipeline-24HMP_8Phys_SpikeReg.json"
            )
        );
    }

    #[test]
    fn test_second_call_reuses() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new();
        let target = dir.path().join("nested").join("a.json");
        let writes = AtomicUsize::new(0);
        let write = |partial: &Path| {
            writes.fetch_add(1, Ordering::SeqCst);
            std::fs::write(partial, "{}").map_err(|e| DenoiseError::io(partial, e))
        };

        let first = store.create_or_reuse(&target, write).unwrap();
        let second = store.create_or_reuse(&target, write).unwrap();

        assert_eq!(first, ArtifactOutcome::Created(target.clone()));
        assert_eq!(second, ArtifactOutcome::Reused(target.clone()));
        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert!(!partial_path(&target).exists());
        assert!(store.claims.lock().is_empty());
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new();
        let target = dir.path().join("b.json");

        let result = store.create_or_reuse(&target, |partial| {
            std::fs::write(partial, "half").unwrap();
            Err(DenoiseError::InvalidBand("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
        assert!(store.claims.lock().is_empty());
    }

    #[test]
    fn test_concurrent_claims_write_once() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::new());
        let target = dir.path().join("c.json");
        let writes = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let target = target.clone();
                let writes = writes.clone();
                std::thread::spawn(move || {
                    store
                        .create_or_reuse(&target, |partial| {
                            writes.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            std::fs::write(partial, "{}").map_err(|e| DenoiseError::io(partial, e))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().path(), target.as_path());
        }
        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert!(store.claims.lock().is_empty());
    }
}
