//! Job definition, execution records and the derived job view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::executor::ExecutionOutcome;

/// Generate a collision-resistant job id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A persisted recurring command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID.
    pub id: String,
    /// User label.
    pub name: String,
    /// Shell command line.
    pub command: String,
    /// Working directory for the process.
    #[serde(default)]
    pub work_directory: Option<String>,
    /// Cron expression or nickname.
    pub frequency: String,
    /// IANA timezone; host local time when absent.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Whether the timer is armed on create, update and startup.
    #[serde(default)]
    pub auto_start: bool,
    /// Fires allowed per armed timer.
    #[serde(default)]
    pub max_executions: Option<u32>,
    /// Execution history, oldest first.
    #[serde(default)]
    pub executions: Vec<Execution>,
}

impl Job {
    /// Build a new job from its fields, with an empty history.
    pub fn new(id: impl Into<String>, fields: NewJob) -> Self {
        Self {
            id: id.into(),
            name: fields.name,
            command: fields.command,
            work_directory: fields.work_directory,
            frequency: fields.frequency,
            timezone: fields.timezone,
            auto_start: fields.auto_start,
            max_executions: fields.max_executions,
            executions: Vec::new(),
        }
    }

    /// The most recent execution, if any.
    pub fn last_execution(&self) -> Option<&Execution> {
        self.executions.last()
    }

    /// Outcome of the most recent execution.
    pub fn last_execution_status(&self) -> LastExecutionStatus {
        match self.last_execution() {
            None => LastExecutionStatus::Never,
            Some(execution) if execution.outcome.failed => LastExecutionStatus::Failed,
            Some(_) => LastExecutionStatus::Success,
        }
    }

    /// Append an execution, keeping at most `retain` records when given.
    pub fn push_execution(&mut self, execution: Execution, retain: Option<usize>) {
        self.executions.push(execution);
        if let Some(retain) = retain {
            let excess = self.executions.len().saturating_sub(retain);
            if excess > 0 {
                self.executions.drain(..excess);
            }
        }
    }
}

/// Fields supplied when creating a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub work_directory: Option<String>,
    pub frequency: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub max_executions: Option<u32>,
}

/// Partial update of a job.
///
/// Merging is presence-based: every field that is present overwrites the
/// stored value, including `false`, `0` and empty strings. For the optional
/// fields an explicit `null` clears the value while an absent key leaves it
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub work_directory: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub timezone: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_executions: Option<Option<u32>>,
}

impl JobPatch {
    /// Patch that only flips `autoStart`.
    pub fn auto_start(auto_start: bool) -> Self {
        Self {
            auto_start: Some(auto_start),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the present fields into `job`. History and id are never touched.
    pub fn apply(&self, job: &mut Job) {
        if let Some(name) = &self.name {
            job.name = name.clone();
        }
        if let Some(command) = &self.command {
            job.command = command.clone();
        }
        if let Some(work_directory) = &self.work_directory {
            job.work_directory = work_directory.clone();
        }
        if let Some(frequency) = &self.frequency {
            job.frequency = frequency.clone();
        }
        if let Some(timezone) = &self.timezone {
            job.timezone = timezone.clone();
        }
        if let Some(auto_start) = self.auto_start {
            job.auto_start = auto_start;
        }
        if let Some(max_executions) = self.max_executions {
            job.max_executions = max_executions;
        }
    }
}

/// Marks a key as present even when its value is `null`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One completed run of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,
}

/// Live status of a job, derived from its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No live timer, or the timer was stopped.
    Stopped,
    /// Timer suspended.
    Paused,
    /// A fire is in progress.
    Running,
    /// Timer armed and waiting for its next fire.
    Active,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Running => "running",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the most recent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastExecutionStatus {
    Never,
    Success,
    Failed,
}

impl LastExecutionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// A job together with its derived, non-persistent state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub status: JobStatus,
    pub last_execution_status: LastExecutionStatus,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub next_execution: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
