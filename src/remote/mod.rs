// ABOUTME: Remote inference service module
// ABOUTME: Groups everything that talks to the inference service over HTTP

pub mod auth;
pub mod client;
pub mod models;
pub mod poller;

pub use auth::TokenProvider;
pub use client::InferenceClient;
pub use models::{
    HealthStatus, InferenceRequest, JobHandle, JobResult, JobState, JobStatus,
    DEFAULT_SAMPLE_LIMIT,
};
pub use poller::{JobPoller, JobService, PollOptions};
