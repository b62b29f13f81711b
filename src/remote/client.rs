// ABOUTME: HTTP client for the battery-health inference API
// ABOUTME: Submits jobs and fetches their status and results

use async_trait::async_trait;
use reqwest::{Client, Response, Url};

use super::auth::TokenProvider;
use super::models::{HealthStatus, InferenceRequest, JobHandle, JobStatus};
use super::poller::JobService;
use crate::config::ClientConfig;
use crate::device::DeviceId;
use crate::error::{status_text, InferenceError, Result};
use crate::report::ReportLocator;

/// Failed response, captured before the body is consumed.
struct HttpFailure {
    status: u16,
    status_text: String,
    body: String,
}

impl HttpFailure {
    async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self {
            status: status.as_u16(),
            status_text: status_text(status),
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: Url,
    reports: ReportLocator,
}

impl InferenceClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InferenceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.parsed_base_url()?,
            reports: ReportLocator::new(config.report_bucket_url.clone()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn reports(&self) -> &ReportLocator {
        &self.reports
    }

    /// Token provider sharing this client's connection pool and timeout.
    pub fn token_provider(&self, endpoint: impl Into<String>) -> TokenProvider {
        TokenProvider::new(self.client.clone(), endpoint)
    }

    /// `{base}/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                InferenceError::Config(format!("base_url '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn trigger(&self, request: &InferenceRequest) -> Result<JobHandle> {
        request.validate()?;
        let url = self.endpoint(&["api", "v1", "inference", "trigger"])?;

        tracing::debug!(
            url = %url,
            evse_id = %request.evse_id,
            connector_id = request.connector_id,
            limit = ?request.limit,
            "Submitting inference job"
        );

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(InferenceError::transport(
                "Failed to submit inference job. The inference service may be unavailable",
            ))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            tracing::warn!(
                status = failure.status,
                body = %failure.body,
                "Inference job submission rejected"
            );
            return Err(InferenceError::Submission {
                status: failure.status,
                status_text: failure.status_text,
                body: failure.body,
            });
        }

        response
            .json::<JobHandle>()
            .await
            .map_err(InferenceError::transport("Failed to parse trigger response"))
    }

    pub async fn fetch_status(&self, job_id: &str) -> Result<JobStatus> {
        let url = self.endpoint(&["api", "v1", "inference", "status", job_id])?;

        let response = self.client.get(url).send().await.map_err(InferenceError::transport(
            "Failed to get job status. The inference service may be unavailable",
        ))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(InferenceError::StatusFetch {
                job_id: job_id.to_string(),
                status: failure.status,
                status_text: failure.status_text,
                body: failure.body,
            });
        }

        response
            .json::<JobStatus>()
            .await
            .map_err(InferenceError::transport("Failed to parse job status"))
    }

    /// Result payload of a completed job. The shape belongs to the service.
    pub async fn fetch_result(&self, job_id: &str) -> Result<serde_json::Value> {
        let url = self.endpoint(&["api", "v1", "inference", "result", job_id])?;

        let response = self.client.get(url).send().await.map_err(InferenceError::transport(
            "Failed to get job result. The inference service may be unavailable",
        ))?;

        if !response.status().is_success() {
            let failure = HttpFailure::from_response(response).await;
            return Err(InferenceError::ResultFetch {
                job_id: job_id.to_string(),
                status: failure.status,
                status_text: failure.status_text,
                body: failure.body,
            });
        }

        response
            .json()
            .await
            .map_err(InferenceError::transport("Failed to parse job result"))
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint(&["health"])?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(InferenceError::transport("Inference service health check failed"))?;

        response
            .json()
            .await
            .map_err(InferenceError::transport("Failed to parse health response"))
    }

    /// Whether a report for `device` is already in storage.
    pub async fn report_exists(&self, device: &DeviceId) -> Result<bool> {
        let url = self.reports.primary_image(device);

        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(InferenceError::transport("Failed to check for an existing report"))?;

        tracing::debug!(url = %url, status = response.status().as_u16(), "Checked report image");
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl JobService for InferenceClient {
    async fn trigger(&self, request: &InferenceRequest) -> Result<JobHandle> {
        InferenceClient::trigger(self, request).await
    }

    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus> {
        InferenceClient::fetch_status(self, job_id).await
    }
}
