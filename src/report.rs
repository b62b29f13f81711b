// ABOUTME: Locates the chart images a completed battery-health job writes to storage
// ABOUTME: Builds artifact URLs from either a device id or a job result

use crate::device::DeviceId;
use crate::remote::JobResult;

pub const REPORT_PREFIX: &str = "battery-reports";

/// Images produced per device, primary report first.
pub const REPORT_IMAGES: [&str; 6] = [
    "battery_health_report.png",
    "voltage_analysis.png",
    "current_analysis.png",
    "temperature_analysis.png",
    "soc_analysis.png",
    "anomaly_detection.png",
];

#[derive(Debug, Clone)]
pub struct ReportLocator {
    bucket_url: String,
}

impl ReportLocator {
    pub fn new(bucket_url: impl Into<String>) -> Self {
        let bucket_url: String = bucket_url.into();
        Self {
            bucket_url: bucket_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn bucket_url(&self) -> &str {
        &self.bucket_url
    }

    pub fn report_dir(&self, device: &DeviceId) -> String {
        format!("{}/{}/{}", self.bucket_url, REPORT_PREFIX, device)
    }

    /// URL of the summary image; its presence means a report exists.
    pub fn primary_image(&self, device: &DeviceId) -> String {
        format!("{}/{}", self.report_dir(device), REPORT_IMAGES[0])
    }

    pub fn artifacts(&self, device: &DeviceId) -> Vec<String> {
        let dir = self.report_dir(device);
        REPORT_IMAGES
            .iter()
            .map(|name| format!("{}/{}", dir, name))
            .collect()
    }

    /// Artifact URLs under the bucket and path the job reported.
    pub fn artifacts_for_result(result: &JobResult) -> Vec<String> {
        let path = result.s3_path.trim_matches('/');
        let dir = if path.is_empty() {
            format!("https://{}.s3.amazonaws.com", result.s3_bucket)
        } else {
            format!("https://{}.s3.amazonaws.com/{}", result.s3_bucket, path)
        };
        REPORT_IMAGES
            .iter()
            .map(|name| format!("{}/{}", dir, name))
            .collect()
    }
}
