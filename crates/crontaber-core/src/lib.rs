//! # Crontaber Core
//!
//! Job scheduling and execution engine: recurring shell commands with
//! cron-style schedules, durable execution history and a live derived status
//! per job.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       JobsService                        │
//! │   create / update / delete / run / pause / stop / list   │
//! └───────┬──────────────────────┬───────────────────┬───────┘
//!         │                      │                   │
//!         ▼                      ▼                   ▼
//! ┌──────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │   JobStore   │◀──│  SchedulerRegistry   │──▶│ Schedule │
//! │ (file / mem) │   │  JobTimer per job id │   │  (cron)  │
//! └──────────────┘   └──────────┬───────────┘   └──────────┘
//!                               │ fire
//!                               ▼
//!                     ┌──────────────────┐
//!                     │ CommandExecutor  │
//!                     │  (sh -c / cmd)   │
//!                     └──────────────────┘
//! ```
//!
//! Status is never stored: [`JobsService`] derives it from the job's timer
//! (`stopped`, `paused`, `running` or `active`) on every read.

pub mod error;
pub mod executor;
pub mod job;
pub mod registry;
pub mod schedule;
pub mod service;
pub mod store;

pub use error::{ScheduleError, ServiceError, ServiceResult, StoreError};
pub use executor::{CommandExecutor, ExecOptions, ExecutionOutcome, ShellExecutor};
pub use job::{
    Execution, Job, JobPatch, JobStatus, JobView, LastExecutionStatus, NewJob, generate_id,
};
pub use registry::{JobTimer, SchedulerRegistry, TimerState};
pub use schedule::{NICKNAMES, Schedule, ScheduleZone, validate};
pub use service::JobsService;
pub use store::{FileJobStore, JobStore, MemoryJobStore};
