//! Job persistence store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::job::{Execution, Job, JobPatch, NewJob, generate_id};

/// Durable storage of job documents.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job with a generated id and an empty history.
    async fn create_job(&self, fields: NewJob) -> Result<Job, StoreError>;

    /// Load a job by ID.
    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Load all jobs, in no particular order.
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Merge the present fields of `patch` into a stored job.
    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<Option<Job>, StoreError>;

    /// Delete a job. Deleting a missing job is not an error.
    async fn delete_job(&self, id: &str) -> Result<(), StoreError>;

    /// Append an execution to a job's history.
    async fn append_execution(
        &self,
        id: &str,
        execution: Execution,
    ) -> Result<Option<Job>, StoreError>;
}

/// In-memory job store for testing.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, fields: NewJob) -> Result<Job, StoreError> {
        let job = Job::new(generate_id(), fields);
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.values().cloned().collect())
    }

    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.get_mut(id).map(|job| {
            patch.apply(job);
            job.clone()
        }))
    }

    async fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id);
        Ok(())
    }

    async fn append_execution(
        &self,
        id: &str,
        execution: Execution,
    ) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.get_mut(id).map(|job| {
            job.push_execution(execution, None);
            job.clone()
        }))
    }
}

/// File system based job store: one JSON document per job.
///
/// Documents live in `<data_dir>/jobs/<id>.json` and are replaced atomically
/// (write to a temporary file, then rename). Read-modify-write operations on
/// the same id are serialized; different ids proceed independently.
pub struct FileJobStore {
    jobs_dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
    retention: Option<usize>,
}

impl FileJobStore {
    /// Create a new file-based job store rooted at `data_dir`.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let jobs_dir = data_dir.as_ref().join("jobs");
        fs::create_dir_all(&jobs_dir).await?;

        debug!("FileJobStore initialized at {:?}", jobs_dir);

        Ok(Self {
            jobs_dir,
            locks: DashMap::new(),
            retention: None,
        })
    }

    /// Keep at most `max` executions per job, dropping the oldest.
    pub fn with_retention(mut self, max: usize) -> Self {
        self.retention = Some(max);
        self
    }

    /// Directory holding the job documents.
    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{}.json", Self::sanitize_id(id)))
    }

    fn sanitize_id(id: &str) -> String {
        id.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    async fn read(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let path = self.job_path(id);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, job: &Job) -> Result<(), StoreError> {
        let path = self.job_path(&job.id);
        let tmp_path = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(job)?;
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!("Saved job '{}' to {:?}", job.id, path);
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create_job(&self, fields: NewJob) -> Result<Job, StoreError> {
        let job = Job::new(generate_id(), fields);
        let _guard = self.lock(&job.id).await;
        self.write(&job).await?;
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.read(id).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(&self.jobs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "json") {
                match fs::read_to_string(&path).await {
                    Ok(content) => match serde_json::from_str::<Job>(&content) {
                        Ok(job) => jobs.push(job),
                        Err(e) => {
                            warn!("Failed to deserialize job from {:?}: {}", path, e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read job file {:?}: {}", path, e);
                    }
                }
            }
        }

        debug!("Loaded {} jobs from {:?}", jobs.len(), self.jobs_dir);
        Ok(jobs)
    }

    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<Option<Job>, StoreError> {
        let _guard = self.lock(id).await;
        let Some(mut job) = self.read(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut job);
        self.write(&job).await?;
        Ok(Some(job))
    }

    async fn delete_job(&self, id: &str) -> Result<(), StoreError> {
        let guard = self.lock(id).await;
        let path = self.job_path(id);

        match fs::remove_file(&path).await {
            Ok(()) => debug!("Deleted job '{}' from {:?}", id, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // Waiters still hold a clone of the mutex; keep it shared with them.
        drop(guard);
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        Ok(())
    }

    async fn append_execution(
        &self,
        id: &str,
        execution: Execution,
    ) -> Result<Option<Job>, StoreError> {
        let _guard = self.lock(id).await;
        let Some(mut job) = self.read(id).await? else {
            debug!("Job '{}' vanished before its execution was recorded", id);
            return Ok(None);
        };
        job.push_execution(execution, self.retention);
        self.write(&job).await?;
        Ok(Some(job))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
