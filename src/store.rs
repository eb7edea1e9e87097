//! Temporary artifact store: per-job scratch storage with guaranteed release.
//!
//! ## Why a `TempDir` root?
//!
//! The store owns a single `tempfile::TempDir`; each job gets a subdirectory
//! named by its [`JobId::storage_key`]. When the store is dropped — normal
//! shutdown or panic — the whole tree vanishes, so even a bug that skips
//! `release_all` cannot leak artifacts past the process lifetime. Within the
//! process lifetime, `release_all` is called on every job exit path and is
//! idempotent: releasing an already-released job is a no-op, not an error.
//!
//! Storage keys are derived from the job id only. User-supplied filenames
//! never touch the filesystem, so path collision and traversal are impossible
//! by construction.

use crate::error::Img2AnyError;
use crate::registry::JobId;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::debug;

/// Distinguishes the artifacts coexisting under one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The downloaded upload, as received.
    Source,
    /// The converted output awaiting delivery.
    Output,
}

impl Role {
    fn file_name(&self) -> &'static str {
        match self {
            Role::Source => "source.bin",
            Role::Output => "output.bin",
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Output => "output",
        }
    }
}

/// Per-job scratch storage rooted in a temporary directory.
#[derive(Debug)]
pub struct ArtifactStore {
    root: TempDir,
}

impl ArtifactStore {
    /// Create a store rooted in a fresh temporary directory.
    pub fn new() -> Result<Self, Img2AnyError> {
        let root = TempDir::new().map_err(|e| {
            Img2AnyError::Internal(format!("failed to create artifact root: {e}"))
        })?;
        debug!(root = %root.path().display(), "artifact store ready");
        Ok(Self { root })
    }

    fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.root.path().join(job_id.storage_key())
    }

    /// Persist an artifact, returning its path.
    pub async fn put(
        &self,
        job_id: JobId,
        role: Role,
        bytes: &[u8],
    ) -> Result<PathBuf, Img2AnyError> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Img2AnyError::StoreIo {
                path: dir.clone(),
                source: e,
            })?;

        let path = dir.join(role.file_name());
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Img2AnyError::StoreIo {
                path: path.clone(),
                source: e,
            })?;

        debug!(job_id = %job_id, role = role.as_str(), bytes = bytes.len(), "artifact stored");
        Ok(path)
    }

    /// Read an artifact back.
    ///
    /// # Errors
    /// [`Img2AnyError::ArtifactNotFound`] when the job's storage was already
    /// released or the role was never written.
    pub async fn read(&self, job_id: JobId, role: Role) -> Result<Vec<u8>, Img2AnyError> {
        let path = self.job_dir(job_id).join(role.file_name());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Img2AnyError::ArtifactNotFound {
                    job_id: job_id.to_string(),
                    role: role.as_str(),
                })
            }
            Err(e) => Err(Img2AnyError::StoreIo { path, source: e }),
        }
    }

    /// Release every artifact belonging to a job.
    ///
    /// Idempotent: releasing a job that holds no storage is a no-op. This is
    /// the cleanup guarantee — called on success, codec failure, delivery
    /// failure, cancellation, and expiry alike.
    pub async fn release_all(&self, job_id: JobId) {
        let dir = self.job_dir(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(job_id = %job_id, "artifacts released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                // Deletion failure is not propagated: the TempDir root still
                // reclaims the space at shutdown.
                tracing::warn!(job_id = %job_id, error = %e, "artifact release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_read_round_trip() {
        let store = ArtifactStore::new().unwrap();
        let id = JobId::new();

        let path = store.put(id, Role::Source, b"abc").await.unwrap();
        assert!(path.ends_with("source.bin"));
        assert_eq!(store.read(id, Role::Source).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn source_and_output_coexist() {
        let store = ArtifactStore::new().unwrap();
        let id = JobId::new();

        store.put(id, Role::Source, b"in").await.unwrap();
        store.put(id, Role::Output, b"out").await.unwrap();

        assert_eq!(store.read(id, Role::Source).await.unwrap(), b"in");
        assert_eq!(store.read(id, Role::Output).await.unwrap(), b"out");
    }

    #[tokio::test]
    async fn release_is_idempotent_and_read_fails_after() {
        let store = ArtifactStore::new().unwrap();
        let id = JobId::new();

        store.put(id, Role::Source, b"abc").await.unwrap();
        store.release_all(id).await;
        store.release_all(id).await; // no-op, no panic

        let err = store.read(id, Role::Source).await.unwrap_err();
        assert!(matches!(err, Img2AnyError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn release_never_written_job_is_noop() {
        let store = ArtifactStore::new().unwrap();
        store.release_all(JobId::new()).await;
    }

    #[tokio::test]
    async fn jobs_are_isolated() {
        let store = ArtifactStore::new().unwrap();
        let a = JobId::new();
        let b = JobId::new();

        store.put(a, Role::Source, b"a").await.unwrap();
        store.put(b, Role::Source, b"b").await.unwrap();
        store.release_all(a).await;

        assert!(store.read(a, Role::Source).await.is_err());
        assert_eq!(store.read(b, Role::Source).await.unwrap(), b"b");
    }
}
