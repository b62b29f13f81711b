// ABOUTME: Library root for the battery-health inference client
// ABOUTME: Re-exports configuration, errors, device ids and the remote job API

pub mod config;
pub mod device;
pub mod error;
pub mod remote;
pub mod report;

pub use config::ClientConfig;
pub use device::DeviceId;
pub use error::{InferenceError, Result};
pub use remote::{
    InferenceClient, InferenceRequest, JobHandle, JobPoller, JobResult, JobService, JobState,
    JobStatus, PollOptions, TokenProvider,
};
pub use report::ReportLocator;
pub use tokio_util::sync::CancellationToken;
