//! Session registry: the map of outstanding conversion jobs.
//!
//! One upload = one [`ConversionJob`], keyed by a random [`JobId`]. The
//! registry is the single point of synchronization for the whole service:
//! [`SessionRegistry::try_begin_conversion`] atomically claims a job for
//! conversion, so two taps of the same button (or a transport retry of the
//! same selection event) can never both transcode.
//!
//! A plain `std::sync::Mutex` over a `HashMap` is deliberate. Every critical
//! section is a few map operations — no await points, no I/O — so the lock is
//! held for nanoseconds and never across a suspension point. Anything fancier
//! (per-entry CAS, sharded maps) would buy nothing at this scale.

use crate::format::ImageFormat;
use crate::transport::ChatRef;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Opaque correlation identifier linking an upload to its later selection.
///
/// Random v4 uuid: collision-free across concurrent uploads and never reused
/// after deletion, unlike a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }

    pub fn from_uuid(u: Uuid) -> Self {
        JobId(u)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Storage-safe key: 32 hex characters, derived from the id only —
    /// never from a user-supplied filename.
    pub fn storage_key(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Lifecycle state of a conversion job.
///
/// `AwaitingSelection → Converting` happens at most once; the three terminal
/// states are final and always paired with artifact release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    AwaitingSelection,
    Converting,
    Delivered,
    Failed,
    Expired,
}

/// Terminal outcome reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered,
    Failed,
}

impl JobOutcome {
    fn to_state(self) -> JobState {
        match self {
            JobOutcome::Delivered => JobState::Delivered,
            JobOutcome::Failed => JobState::Failed,
        }
    }
}

/// One upload-to-delivery conversion transaction.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub chat: ChatRef,
    pub source_format: ImageFormat,
    /// Location of the source artifact in the store; exclusively owned by
    /// this job.
    pub source_path: PathBuf,
    pub state: JobState,
    /// Monotonic creation time, used only for expiry.
    pub created_at: Instant,
}

/// Tracks outstanding conversion jobs and enforces at-most-one conversion
/// per correlation identifier.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    jobs: Mutex<HashMap<JobId, ConversionJob>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in `AwaitingSelection` under a fresh random id.
    pub fn create(
        &self,
        chat: ChatRef,
        source_format: ImageFormat,
        source_path: PathBuf,
    ) -> JobId {
        self.create_with_id(JobId::new(), chat, source_format, source_path)
    }

    /// Register a new job under a caller-chosen id.
    ///
    /// Used when the id was needed before registration (the source artifact
    /// is stored under the job key first, so the path exists by the time the
    /// job becomes visible to selections).
    pub fn create_with_id(
        &self,
        id: JobId,
        chat: ChatRef,
        source_format: ImageFormat,
        source_path: PathBuf,
    ) -> JobId {
        let job = ConversionJob {
            id,
            chat,
            source_format,
            source_path,
            state: JobState::AwaitingSelection,
            created_at: Instant::now(),
        };
        debug!(job_id = %id, format = %source_format, "registered job");
        self.jobs.lock().expect("registry poisoned").insert(id, job);
        id
    }

    /// Snapshot of a job, if present.
    pub fn get(&self, id: JobId) -> Option<ConversionJob> {
        self.jobs.lock().expect("registry poisoned").get(&id).cloned()
    }

    /// Atomically transition `AwaitingSelection → Converting`.
    ///
    /// Returns `false` when the job is absent or not awaiting — the caller
    /// must treat that as "already handled or expired" and stop. This is the
    /// sole serialization point for concurrent selection events.
    pub fn try_begin_conversion(&self, id: JobId) -> bool {
        let mut jobs = self.jobs.lock().expect("registry poisoned");
        match jobs.get_mut(&id) {
            Some(job) if job.state == JobState::AwaitingSelection => {
                job.state = JobState::Converting;
                debug!(job_id = %id, "job claimed for conversion");
                true
            }
            Some(job) => {
                debug!(job_id = %id, state = ?job.state, "begin refused: not awaiting");
                false
            }
            None => {
                debug!(job_id = %id, "begin refused: unknown job");
                false
            }
        }
    }

    /// Remove a job on reaching a terminal outcome, returning it so the
    /// caller can release its artifacts.
    ///
    /// Idempotent: completing an already-removed job returns `None`.
    pub fn complete(&self, id: JobId, outcome: JobOutcome) -> Option<ConversionJob> {
        let mut jobs = self.jobs.lock().expect("registry poisoned");
        let mut job = jobs.remove(&id)?;
        job.state = outcome.to_state();
        debug!(job_id = %id, state = ?job.state, "job completed");
        Some(job)
    }

    /// Remove a job that is still `AwaitingSelection` (user cancel or
    /// supersession by a newer upload). Jobs in any other state are left
    /// alone and `None` is returned.
    pub fn cancel_awaiting(&self, id: JobId) -> Option<ConversionJob> {
        let mut jobs = self.jobs.lock().expect("registry poisoned");
        match jobs.get(&id) {
            Some(job) if job.state == JobState::AwaitingSelection => {
                let mut job = jobs.remove(&id)?;
                job.state = JobState::Expired;
                Some(job)
            }
            _ => None,
        }
    }

    /// Harvest jobs that have been `AwaitingSelection` longer than `age`.
    ///
    /// Removed jobs are returned in `Expired` state so the sweep can release
    /// their artifacts and notify their chats. A job mid-`Converting` is
    /// never force-expired: it either completes or reports failure first.
    pub fn expire_older_than(&self, age: Duration) -> Vec<ConversionJob> {
        let mut jobs = self.jobs.lock().expect("registry poisoned");
        let now = Instant::now();
        let stale: Vec<JobId> = jobs
            .values()
            .filter(|j| {
                j.state == JobState::AwaitingSelection
                    && now.duration_since(j.created_at) > age
            })
            .map(|j| j.id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| {
                let mut job = jobs.remove(&id)?;
                job.state = JobState::Expired;
                warn!(job_id = %id, chat = %job.chat, "job expired unattended");
                Some(job)
            })
            .collect()
    }

    /// Number of outstanding (non-terminal) jobs.
    pub fn len(&self) -> usize {
        self.jobs.lock().expect("registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
