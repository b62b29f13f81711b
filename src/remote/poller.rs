// ABOUTME: Trigger-then-poll workflow for inference jobs
// ABOUTME: Observes job state until a terminal status, the deadline, or cancellation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::models::{InferenceRequest, JobHandle, JobState, JobStatus};
use crate::error::{InferenceError, Result};

/// The two calls the polling loop needs from a job service.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn trigger(&self, request: &InferenceRequest) -> Result<JobHandle>;

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus>;
}

#[async_trait]
impl<'a, T: JobService + ?Sized> JobService for &'a T {
    async fn trigger(&self, request: &InferenceRequest) -> Result<JobHandle> {
        (**self).trigger(request).await
    }

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus> {
        (**self).fetch_status(job_id).await
    }
}

#[async_trait]
impl<T: JobService + ?Sized> JobService for Arc<T> {
    async fn trigger(&self, request: &InferenceRequest) -> Result<JobHandle> {
        (**self).trigger(request).await
    }

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus> {
        (**self).fetch_status(job_id).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct JobPoller<S> {
    service: S,
    options: PollOptions,
}

impl<S: JobService> JobPoller<S> {
    pub fn new(service: S, options: PollOptions) -> Self {
        Self { service, options }
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Poll `job_id` until it reaches `completed` or `failed`.
    ///
    /// A `failed` job is returned as `Ok`; callers inspect `status`. The
    /// timeout is measured from this call.
    pub async fn poll(
        &self,
        job_id: &str,
        on_progress: impl FnMut(&JobStatus),
        cancel: &CancellationToken,
    ) -> Result<JobStatus> {
        let deadline = Instant::now() + self.options.timeout;
        self.poll_until(job_id, deadline, on_progress, cancel).await
    }

    /// Submit `request` and poll the resulting job to a terminal state.
    ///
    /// The deadline starts before the trigger call, so a slow submission
    /// eats into the polling budget.
    pub async fn run(
        &self,
        request: &InferenceRequest,
        on_progress: impl FnMut(&JobStatus),
        cancel: &CancellationToken,
    ) -> Result<JobStatus> {
        let deadline = Instant::now() + self.options.timeout;

        if cancel.is_cancelled() {
            return Err(InferenceError::Cancelled {
                job_id: String::new(),
            });
        }

        let handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(InferenceError::Cancelled { job_id: String::new() });
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(evse_id = %request.evse_id, "Inference job submission outlived the deadline");
                return Err(InferenceError::PollTimeout {
                    job_id: String::new(),
                    timeout: self.options.timeout,
                });
            }
            handle = self.service.trigger(request) => handle?,
        };

        tracing::info!(
            job_id = %handle.job_id,
            evse_id = %request.evse_id,
            connector_id = request.connector_id,
            "Inference job submitted"
        );

        self.poll_until(&handle.job_id, deadline, on_progress, cancel)
            .await
    }

    /// Run several independent jobs concurrently, one result per request in
    /// input order. A failure of one job does not affect the others.
    pub async fn run_many(
        &self,
        requests: &[InferenceRequest],
        cancel: &CancellationToken,
    ) -> Vec<Result<JobStatus>> {
        join_all(
            requests
                .iter()
                .map(|request| self.run(request, |_| {}, cancel)),
        )
        .await
    }

    async fn poll_until(
        &self,
        job_id: &str,
        deadline: Instant,
        mut on_progress: impl FnMut(&JobStatus),
        cancel: &CancellationToken,
    ) -> Result<JobStatus> {
        let cancelled = || InferenceError::Cancelled {
            job_id: job_id.to_string(),
        };
        let timed_out = || InferenceError::PollTimeout {
            job_id: job_id.to_string(),
            timeout: self.options.timeout,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            if Instant::now() >= deadline {
                tracing::warn!(job_id, "Inference job did not finish before the deadline");
                return Err(timed_out());
            }

            // The deadline bounds the in-flight fetch as well as the sleep.
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(job_id, "Status fetch outlived the deadline");
                    return Err(timed_out());
                }
                status = self.service.fetch_status(job_id) => status?,
            };

            tracing::debug!(
                job_id,
                status = %status.status,
                progress = status.progress,
                message = %status.message,
                "Polled inference job"
            );
            if status.status == JobState::Unknown {
                tracing::warn!(job_id, "Job service reported an unrecognised status");
            }

            on_progress(&status);

            if status.is_terminal() {
                tracing::info!(job_id, status = %status.status, "Inference job finished");
                return Ok(status);
            }

            let next_poll = (Instant::now() + self.options.interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep_until(next_poll) => {}
            }
        }
    }
}
