// ABOUTME: Error taxonomy for the inference job client
// ABOUTME: Separates "could not talk to the job service" from local validation failures

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    /// The trigger endpoint answered with a non-success status.
    #[error("Failed to trigger inference: {status_text}")]
    Submission {
        status: u16,
        status_text: String,
        body: String,
    },

    /// A status poll answered with a non-success status.
    #[error("Failed to get job status for {job_id}: {status_text}")]
    StatusFetch {
        job_id: String,
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Failed to get job result for {job_id}: {status_text}")]
    ResultFetch {
        job_id: String,
        status: u16,
        status_text: String,
        body: String,
    },

    /// No terminal state was observed before the deadline.
    #[error("Job polling timeout: {job_id} did not finish within {}s", .timeout.as_secs())]
    PollTimeout { job_id: String, timeout: Duration },

    /// `job_id` is empty when cancellation happened before submission.
    #[error("Inference job cancelled")]
    Cancelled { job_id: String },

    #[error("{context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid inference request: {0}")]
    InvalidRequest(String),

    #[error("Invalid device id '{input}': {reason}")]
    InvalidDevice { input: String, reason: String },

    #[error("Failed to obtain authorization token: {0}")]
    Token(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl InferenceError {
    pub(crate) fn transport(context: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| InferenceError::Transport { context, source }
    }

    /// Whether re-running the whole trigger/poll sequence could succeed.
    /// Local validation and configuration problems never fix themselves.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            InferenceError::InvalidRequest(_)
                | InferenceError::InvalidDevice { .. }
                | InferenceError::Config(_)
        )
    }

    /// HTTP status of the failed response, when the error came from one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            InferenceError::Submission { status, .. }
            | InferenceError::StatusFetch { status, .. }
            | InferenceError::ResultFetch { status, .. } => Some(*status),
            InferenceError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Reason phrase for a status code, falling back to the numeric code.
pub(crate) fn status_text(status: reqwest::StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}
