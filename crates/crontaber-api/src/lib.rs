//! # Crontaber API
//!
//! Boundary layer between the UI and the jobs service.
//!
//! - **IPC**: named channels (`job:create`, `job:list`, ...) dispatched by
//!   [`IpcRouter`], each answering with the uniform [`Envelope`]
//! - **HTTP bridge**: `POST /ipc/{channel}` exposing the same channels to
//!   out-of-process clients such as the CLI

pub mod error;
pub mod ipc;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use ipc::{
    Envelope, FolderPicker, HeadlessFolderPicker, IpcChannel, IpcRouter, JobIdRequest,
    PREVIEW_COUNT, SchedulePreview, ScheduleRequest, UpdateJobRequest,
};
pub use routes::create_router;
pub use server::{BridgeConfig, IpcServer};
