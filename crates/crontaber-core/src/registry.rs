//! Scheduler registry - live timers keyed by job id.
//!
//! Each armed job gets a [`JobTimer`] driven by its own tokio task. The task
//! sleeps until the next fire time of the job's schedule, runs the command
//! through the [`CommandExecutor`] and appends the outcome through the
//! [`JobStore`]. A timer awaits the whole fire cycle before computing its
//! next fire, so runs of the same job never overlap.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, SubsecRound, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::executor::{CommandExecutor, ExecOptions};
use crate::job::{Execution, Job};
use crate::schedule::{Schedule, ScheduleError};
use crate::store::JobStore;

/// Lifecycle state of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Waiting for the next fire.
    Armed,
    /// Suspended; resumes from the next future fire.
    Paused,
    /// Terminal. The driving task exits.
    Stopped,
}

/// A live timer for one job.
pub struct JobTimer {
    job_id: String,
    command: String,
    options: ExecOptions,
    schedule: Schedule,
    max_fires: Option<u64>,

    state: Mutex<TimerState>,
    busy: AtomicBool,
    fire_count: AtomicU64,
    /// Scheduled time of the last timer-driven fire.
    last_fire: Mutex<Option<DateTime<Utc>>>,
    wake: Notify,
    /// Serializes fire cycles.
    cycle: tokio::sync::Mutex<()>,

    store: Arc<dyn JobStore>,
    executor: Arc<dyn CommandExecutor>,
}

impl JobTimer {
    fn new(
        job: &Job,
        schedule: Schedule,
        store: Arc<dyn JobStore>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let options = match &job.work_directory {
            Some(dir) => ExecOptions::new().work_directory(dir),
            None => ExecOptions::new(),
        };

        Self {
            job_id: job.id.clone(),
            command: job.command.clone(),
            options,
            schedule,
            max_fires: job.max_executions.map(u64::from),
            state: Mutex::new(TimerState::Armed),
            busy: AtomicBool::new(false),
            fire_count: AtomicU64::new(0),
            last_fire: Mutex::new(None),
            wake: Notify::new(),
            cycle: tokio::sync::Mutex::new(()),
            store,
            executor,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn state(&self) -> TimerState {
        *self.state.lock()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == TimerState::Stopped
    }

    pub fn is_paused(&self) -> bool {
        self.state() == TimerState::Paused
    }

    /// Whether a fire cycle is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Number of completed fires since the timer was armed.
    pub fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::Relaxed)
    }

    /// Suspend an armed timer.
    pub fn pause(&self) {
        if self.transition(TimerState::Armed, TimerState::Paused) {
            debug!("Timer for job '{}' paused", self.job_id);
        }
    }

    /// Resume a paused timer. Fires missed while paused are skipped.
    pub fn resume(&self) {
        if self.transition(TimerState::Paused, TimerState::Armed) {
            debug!("Timer for job '{}' resumed", self.job_id);
        }
    }

    /// Stop the timer for good. An in-flight fire still completes.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), TimerState::Stopped);
        if previous != TimerState::Stopped {
            debug!("Timer for job '{}' stopped", self.job_id);
        }
        self.wake.notify_one();
    }

    /// Next fire time, or `None` unless the timer is armed.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        if self.state() != TimerState::Armed {
            return None;
        }
        let now = Utc::now();
        let anchor = match *self.last_fire.lock() {
            Some(last) if last > now => last,
            _ => now,
        };
        self.schedule.next_run(anchor)
    }

    /// Run one fire cycle now: execute the command and record the outcome.
    ///
    /// Cycles of the same timer are serialized. Reaching the fire limit
    /// stops the timer.
    pub async fn fire(&self) -> Execution {
        let _cycle = self.cycle.lock().await;
        self.busy.store(true, Ordering::SeqCst);

        info!("Firing job '{}'", self.job_id);
        let started_at = Utc::now().trunc_subsecs(3);
        let outcome = self.executor.execute(&self.command, &self.options).await;
        let finished_at = Utc::now().trunc_subsecs(3).max(started_at);
        let execution = Execution {
            outcome,
            started_at,
            finished_at,
        };

        if execution.outcome.failed {
            info!(
                "Job '{}' failed: {}",
                self.job_id,
                execution.outcome.error.as_deref().unwrap_or("unknown error")
            );
        }

        match self
            .store
            .append_execution(&self.job_id, execution.clone())
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => debug!(
                "Job '{}' no longer exists, execution dropped",
                self.job_id
            ),
            Err(e) => error!(
                "Failed to record execution for job '{}': {}",
                self.job_id, e
            ),
        }

        self.busy.store(false, Ordering::SeqCst);
        let fired = self.fire_count.fetch_add(1, Ordering::Relaxed) + 1;

        if self.max_fires.is_some_and(|max| fired >= max) {
            info!(
                "Job '{}' reached its limit of {} executions",
                self.job_id, fired
            );
            self.stop();
        }

        execution
    }

    fn transition(&self, from: TimerState, to: TimerState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        drop(state);
        self.wake.notify_one();
        true
    }
}

/// Drive a timer until it stops.
async fn drive(timer: Arc<JobTimer>) {
    loop {
        let mut notified = pin!(timer.wake.notified());
        notified.as_mut().enable();

        match timer.state() {
            TimerState::Stopped => break,
            TimerState::Paused => {
                notified.await;
                continue;
            }
            TimerState::Armed => {}
        }

        let Some(next) = timer.next_run() else {
            info!("Job '{}' has no upcoming fire time", timer.job_id);
            timer.stop();
            break;
        };
        let delay = (next - Utc::now()).to_std().unwrap_or_default();
        debug!(
            "Job '{}' next fire at {} (in {:?})",
            timer.job_id,
            next.to_rfc3339(),
            delay
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = &mut notified => continue,
        }

        if timer.state() != TimerState::Armed {
            continue;
        }
        *timer.last_fire.lock() = Some(next);
        timer.fire().await;
    }

    debug!("Timer task for job '{}' exited", timer.job_id);
}

/// Table of live timers, at most one per job id.
pub struct SchedulerRegistry {
    timers: DashMap<String, Arc<JobTimer>>,
    store: Arc<dyn JobStore>,
    executor: Arc<dyn CommandExecutor>,
}

impl SchedulerRegistry {
    pub fn new(store: Arc<dyn JobStore>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            timers: DashMap::new(),
            store,
            executor,
        }
    }

    /// Arm a timer for `job`, replacing and stopping any previous one.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] when the job's schedule does not parse; the
    /// registry is left unchanged in that case.
    pub fn arm(&self, job: &Job) -> Result<Arc<JobTimer>, ScheduleError> {
        let schedule = Schedule::parse(&job.frequency, job.timezone.as_deref())?;
        let timer = Arc::new(JobTimer::new(
            job,
            schedule,
            self.store.clone(),
            self.executor.clone(),
        ));

        if let Some(previous) = self.timers.insert(job.id.clone(), timer.clone()) {
            previous.stop();
        }
        tokio::spawn(drive(timer.clone()));

        info!(
            "Armed job '{}' with schedule '{}' ({})",
            job.id,
            timer.schedule.expression(),
            timer.schedule.zone()
        );
        Ok(timer)
    }

    /// Look up the live timer of a job.
    pub fn find(&self, id: &str) -> Option<Arc<JobTimer>> {
        self.timers.get(id).map(|entry| entry.value().clone())
    }

    /// Pause a timer. Returns `false` when none is registered.
    pub fn pause(&self, id: &str) -> bool {
        match self.find(id) {
            Some(timer) => {
                timer.pause();
                true
            }
            None => false,
        }
    }

    /// Resume a paused timer. Returns `false` when none is registered.
    pub fn resume(&self, id: &str) -> bool {
        match self.find(id) {
            Some(timer) => {
                timer.resume();
                true
            }
            None => false,
        }
    }

    /// Stop a timer, keeping it registered. Returns `false` when none is
    /// registered.
    pub fn stop(&self, id: &str) -> bool {
        match self.find(id) {
            Some(timer) => {
                timer.stop();
                true
            }
            None => false,
        }
    }

    /// Stop and unregister a timer.
    pub fn remove(&self, id: &str) -> Option<Arc<JobTimer>> {
        let (_, timer) = self.timers.remove(id)?;
        timer.stop();
        info!("Disarmed job '{}'", id);
        Some(timer)
    }

    /// Number of registered timers, stopped ones included.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Stop and unregister every timer.
    pub fn shutdown(&self) {
        let count = self.timers.len();
        for entry in self.timers.iter() {
            entry.value().stop();
        }
        self.timers.clear();
        info!("Scheduler registry shut down ({} timers stopped)", count);
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
