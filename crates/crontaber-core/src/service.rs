//! Jobs service - the facade over store, schedule and registry.
//!
//! Every mutating call validates first, persists second and touches the
//! registry last, so a failed validation or store write leaves the live
//! timers unchanged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::job::{Job, JobPatch, JobStatus, JobView, NewJob};
use crate::registry::SchedulerRegistry;
use crate::schedule::Schedule;
use crate::store::JobStore;

/// Job lifecycle operations with derived live status.
pub struct JobsService {
    store: Arc<dyn JobStore>,
    registry: SchedulerRegistry,
    started: AtomicBool,
}

impl JobsService {
    pub fn new(store: Arc<dyn JobStore>, registry: SchedulerRegistry) -> Self {
        Self {
            store,
            registry,
            started: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &SchedulerRegistry {
        &self.registry
    }

    /// Whether [`start_jobs`](Self::start_jobs) has completed.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Validate and persist a new job, arming it when `autoStart` is set.
    pub async fn create_job(&self, fields: NewJob) -> ServiceResult<Job> {
        let fields = NewJob {
            work_directory: non_blank(fields.work_directory),
            timezone: non_blank(fields.timezone),
            ..fields
        };
        validate(
            &fields.name,
            &fields.command,
            &fields.frequency,
            fields.timezone.as_deref(),
            fields.max_executions,
        )?;

        let job = self.store.create_job(fields).await?;
        info!("Created job '{}' ({})", job.id, job.name);

        if job.auto_start {
            self.registry.arm(&job)?;
        }
        Ok(job)
    }

    /// Merge `patch` into a job and re-arm it according to the result.
    ///
    /// Returns `None` when the job does not exist.
    pub async fn update_job(&self, id: &str, patch: JobPatch) -> ServiceResult<Option<Job>> {
        let patch = JobPatch {
            work_directory: patch.work_directory.map(non_blank),
            timezone: patch.timezone.map(non_blank),
            ..patch
        };

        let Some(mut merged) = self.store.get_job(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut merged);
        validate(
            &merged.name,
            &merged.command,
            &merged.frequency,
            merged.timezone.as_deref(),
            merged.max_executions,
        )?;

        let Some(job) = self.store.update_job(id, patch).await? else {
            return Ok(None);
        };
        info!("Updated job '{}'", id);

        self.registry.remove(id);
        if job.auto_start {
            self.registry.arm(&job)?;
        }
        Ok(Some(job))
    }

    /// Delete a job and disarm its timer. Missing jobs are ignored.
    pub async fn delete_job(&self, id: &str) -> ServiceResult<()> {
        self.store.delete_job(id).await?;
        self.registry.remove(id);
        info!("Deleted job '{}'", id);
        Ok(())
    }

    /// Resume a live timer, or arm a fresh one from the stored job.
    ///
    /// Returns `false` when the job does not exist.
    pub async fn run_job(&self, id: &str) -> ServiceResult<bool> {
        if let Some(timer) = self.registry.find(id) {
            if !timer.is_stopped() {
                timer.resume();
                info!("Resumed job '{}'", id);
                return Ok(true);
            }
        }

        let Some(job) = self.store.get_job(id).await? else {
            return Ok(false);
        };
        self.registry.arm(&job)?;
        Ok(true)
    }

    /// Suspend a job's timer. Returns `false` when no timer is live.
    pub async fn pause_job(&self, id: &str) -> ServiceResult<bool> {
        let paused = self.registry.pause(id);
        if paused {
            info!("Paused job '{}'", id);
        }
        Ok(paused)
    }

    /// Persist `autoStart = false` and disarm the job's timer.
    ///
    /// Returns `false` when the job does not exist.
    pub async fn stop_job(&self, id: &str) -> ServiceResult<bool> {
        let updated = self.store.update_job(id, JobPatch::auto_start(false)).await?;
        self.registry.remove(id);
        if updated.is_some() {
            info!("Stopped job '{}'", id);
        }
        Ok(updated.is_some())
    }

    /// All jobs with their derived status.
    pub async fn list_jobs(&self) -> ServiceResult<Vec<JobView>> {
        let jobs = self.store.list_jobs().await?;
        Ok(jobs.into_iter().map(|job| self.view(job)).collect())
    }

    /// One job with its derived status.
    pub async fn get_job(&self, id: &str) -> ServiceResult<Option<JobView>> {
        let job = self.store.get_job(id).await?;
        Ok(job.map(|job| self.view(job)))
    }

    /// Arm every persisted job with `autoStart` set. Allowed once.
    ///
    /// Jobs whose schedule no longer parses are logged and skipped.
    pub async fn start_jobs(&self) -> ServiceResult<usize> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyStarted);
        }

        let jobs = match self.store.list_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let mut armed = 0;
        for job in jobs.iter().filter(|job| job.auto_start) {
            match self.registry.arm(job) {
                Ok(_) => armed += 1,
                Err(e) => warn!("Skipping job '{}' at startup: {}", job.id, e),
            }
        }

        info!("Started {} of {} jobs", armed, jobs.len());
        Ok(armed)
    }

    /// Stop every timer.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    /// Build the view of a job from its timer.
    pub fn view(&self, job: Job) -> JobView {
        let (status, next_execution) = match self.registry.find(&job.id) {
            None => (JobStatus::Stopped, None),
            Some(timer) if timer.is_stopped() => (JobStatus::Stopped, None),
            Some(timer) if timer.is_paused() => (JobStatus::Paused, None),
            Some(timer) if timer.is_busy() => (JobStatus::Running, timer.next_run()),
            Some(timer) => (JobStatus::Active, timer.next_run()),
        };

        JobView {
            last_execution_status: job.last_execution_status(),
            status,
            next_execution,
            job,
        }
    }
}

fn validate(
    name: &str,
    command: &str,
    frequency: &str,
    timezone: Option<&str>,
    max_executions: Option<u32>,
) -> ServiceResult<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::Validation("name must not be empty".to_string()));
    }
    if command.trim().is_empty() {
        return Err(ServiceError::Validation(
            "command must not be empty".to_string(),
        ));
    }
    if max_executions == Some(0) {
        return Err(ServiceError::Validation(
            "maxExecutions must be positive".to_string(),
        ));
    }
    Schedule::parse(frequency, timezone)?;
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
