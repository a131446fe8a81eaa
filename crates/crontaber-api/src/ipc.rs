//! IPC channels and the uniform response envelope.
//!
//! Every request names a channel (`job:create`, `job:list`, ...) and carries
//! a JSON payload. Every response is an [`Envelope`]: failures never escape
//! the boundary as errors, they are logged and reported with
//! `failed: true` and a human-readable message.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use crontaber_core::{JobPatch, JobsService, NewJob, Schedule, ServiceError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::ApiError;

/// Number of fire times previewed by `schedule:validate`.
pub const PREVIEW_COUNT: usize = 5;

/// Known IPC channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpcChannel {
    JobCreate,
    JobList,
    JobGet,
    JobUpdate,
    JobDelete,
    JobRun,
    JobPause,
    JobStop,
    DialogGetFolderPath,
    ScheduleValidate,
}

impl IpcChannel {
    pub const ALL: [IpcChannel; 10] = [
        Self::JobCreate,
        Self::JobList,
        Self::JobGet,
        Self::JobUpdate,
        Self::JobDelete,
        Self::JobRun,
        Self::JobPause,
        Self::JobStop,
        Self::DialogGetFolderPath,
        Self::ScheduleValidate,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JobCreate => "job:create",
            Self::JobList => "job:list",
            Self::JobGet => "job:get",
            Self::JobUpdate => "job:update",
            Self::JobDelete => "job:delete",
            Self::JobRun => "job:run",
            Self::JobPause => "job:pause",
            Self::JobStop => "job:stop",
            Self::DialogGetFolderPath => "dialog:get-folder-path",
            Self::ScheduleValidate => "schedule:validate",
        }
    }

    /// Job channels are refused until the service has started its jobs.
    pub const fn requires_started(self) -> bool {
        !matches!(self, Self::DialogGetFolderPath | Self::ScheduleValidate)
    }

    const fn success_message(self) -> &'static str {
        match self {
            Self::JobCreate => "Job created successfully",
            Self::JobList => "Jobs fetched successfully",
            Self::JobGet => "Job fetched successfully",
            Self::JobUpdate => "Job updated successfully",
            Self::JobDelete => "Job deleted successfully",
            Self::JobRun => "Job started successfully",
            Self::JobPause => "Job paused successfully",
            Self::JobStop => "Job stopped successfully",
            Self::DialogGetFolderPath => "Folder selection finished",
            Self::ScheduleValidate => "Schedule is valid",
        }
    }
}

impl fmt::Display for IpcChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpcChannel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| ApiError::UnknownChannel(s.to_string()))
    }
}

/// Uniform response of every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub failed: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            failed: false,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Payload of the channels addressing a single job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdRequest {
    pub job_id: String,
}

/// Payload of `job:update`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    pub job_id: String,
    #[serde(flatten)]
    pub patch: JobPatch,
}

/// Payload of `schedule:validate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub frequency: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Result of `schedule:validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePreview {
    pub expression: String,
    pub timezone: String,
    /// Upcoming fire times in epoch milliseconds.
    pub next_executions: Vec<i64>,
}

/// Native folder chooser behind `dialog:get-folder-path`.
#[async_trait]
pub trait FolderPicker: Send + Sync {
    /// The chosen folder, or `None` when the user cancelled.
    async fn pick_folder(&self) -> Option<String>;
}

/// Picker for hosts without a desktop: always cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessFolderPicker;

#[async_trait]
impl FolderPicker for HeadlessFolderPicker {
    async fn pick_folder(&self) -> Option<String> {
        None
    }
}

/// Dispatches IPC requests to the jobs service.
#[derive(Clone)]
pub struct IpcRouter {
    service: Arc<JobsService>,
    folder_picker: Arc<dyn FolderPicker>,
}

impl IpcRouter {
    pub fn new(service: Arc<JobsService>) -> Self {
        Self {
            service,
            folder_picker: Arc::new(HeadlessFolderPicker),
        }
    }

    /// Use a different folder picker.
    pub fn with_folder_picker(mut self, folder_picker: Arc<dyn FolderPicker>) -> Self {
        self.folder_picker = folder_picker;
        self
    }

    pub fn service(&self) -> &Arc<JobsService> {
        &self.service
    }

    /// Handle one request. Never fails: errors become failed envelopes.
    pub async fn dispatch(&self, channel: IpcChannel, payload: Value) -> Envelope {
        debug!("IPC request on {}", channel);
        match self.handle(channel, payload).await {
            Ok(data) => Envelope::success(channel.success_message(), data),
            Err(e) => {
                error!("IPC {} failed: {}", channel, e);
                Envelope::failure(e.to_string())
            }
        }
    }

    /// Resolve a channel name, then dispatch.
    pub async fn dispatch_named(&self, channel: &str, payload: Value) -> Envelope {
        match channel.parse::<IpcChannel>() {
            Ok(channel) => self.dispatch(channel, payload).await,
            Err(e) => {
                error!("IPC request rejected: {}", e);
                Envelope::failure(e.to_string())
            }
        }
    }

    async fn handle(&self, channel: IpcChannel, payload: Value) -> Result<Value, ApiError> {
        if channel.requires_started() && !self.service.is_started() {
            return Err(ServiceError::NotStarted.into());
        }

        match channel {
            IpcChannel::JobCreate => {
                let fields: NewJob = parse(channel, payload)?;
                let job = self.service.create_job(fields).await?;
                Ok(serde_json::to_value(self.service.view(job))?)
            }
            IpcChannel::JobList => Ok(serde_json::to_value(self.service.list_jobs().await?)?),
            IpcChannel::JobGet => {
                let req: JobIdRequest = parse(channel, payload)?;
                Ok(serde_json::to_value(self.service.get_job(&req.job_id).await?)?)
            }
            IpcChannel::JobUpdate => {
                let req: UpdateJobRequest = parse(channel, payload)?;
                let job = self
                    .service
                    .update_job(&req.job_id, req.patch)
                    .await?
                    .ok_or(ApiError::JobNotFound(req.job_id))?;
                Ok(serde_json::to_value(self.service.view(job))?)
            }
            IpcChannel::JobDelete => {
                let req: JobIdRequest = parse(channel, payload)?;
                self.service.delete_job(&req.job_id).await?;
                Ok(Value::Null)
            }
            IpcChannel::JobRun => {
                let req: JobIdRequest = parse(channel, payload)?;
                if !self.service.run_job(&req.job_id).await? {
                    return Err(ApiError::JobNotFound(req.job_id));
                }
                Ok(Value::Null)
            }
            IpcChannel::JobPause => {
                let req: JobIdRequest = parse(channel, payload)?;
                self.service.pause_job(&req.job_id).await?;
                Ok(Value::Null)
            }
            IpcChannel::JobStop => {
                let req: JobIdRequest = parse(channel, payload)?;
                if !self.service.stop_job(&req.job_id).await? {
                    return Err(ApiError::JobNotFound(req.job_id));
                }
                Ok(Value::Null)
            }
            IpcChannel::DialogGetFolderPath => {
                Ok(serde_json::to_value(self.folder_picker.pick_folder().await)?)
            }
            IpcChannel::ScheduleValidate => {
                let req: ScheduleRequest = parse(channel, payload)?;
                let schedule = Schedule::parse(&req.frequency, req.timezone.as_deref())
                    .map_err(ServiceError::from)?;
                let preview = SchedulePreview {
                    expression: schedule.expression().to_string(),
                    timezone: schedule.zone().to_string(),
                    next_executions: schedule
                        .upcoming(Utc::now(), PREVIEW_COUNT)
                        .iter()
                        .map(|fire| fire.timestamp_millis())
                        .collect(),
                };
                Ok(serde_json::to_value(preview)?)
            }
        }
    }
}

fn parse<T: DeserializeOwned>(channel: IpcChannel, payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::InvalidPayload {
        channel: channel.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
