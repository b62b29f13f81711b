// ABOUTME: End-to-end tests of the inference client against an in-process mock service
// ABOUTME: Every endpoint the client calls is served by an axum router on a random port

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use zeflash_inference::{
    CancellationToken, ClientConfig, DeviceId, InferenceClient, InferenceError, InferenceRequest,
    JobPoller, JobState, JobStatus, PollOptions,
};

struct MockService {
    trigger_response: (StatusCode, Value),
    // Each job replays its own script; the last entry repeats once the
    // others are used up. Jobs without a script start from `default_script`.
    default_script: Vec<(StatusCode, Value)>,
    scripts: Mutex<HashMap<String, VecDeque<(StatusCode, Value)>>>,
    trigger_bodies: Mutex<Vec<Value>>,
    status_calls: AtomicUsize,
    status_calls_by_job: Mutex<HashMap<String, usize>>,
}

impl MockService {
    fn new(trigger_response: (StatusCode, Value), statuses: Vec<(StatusCode, Value)>) -> Arc<Self> {
        Self::with_scripts(trigger_response, statuses, Vec::new())
    }

    fn with_scripts(
        trigger_response: (StatusCode, Value),
        default_script: Vec<(StatusCode, Value)>,
        scripts: Vec<(&str, Vec<(StatusCode, Value)>)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            trigger_response,
            default_script,
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|(job_id, script)| (job_id.to_string(), script.into()))
                    .collect(),
            ),
            trigger_bodies: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            status_calls_by_job: Mutex::new(HashMap::new()),
        })
    }

    fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn status_calls_for(&self, job_id: &str) -> usize {
        self.status_calls_by_job
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }
}

/// Echoes the configured trigger response. When it carries no `job_id`,
/// one is derived from the device so concurrent jobs get distinct ids.
async fn trigger(
    State(mock): State<Arc<MockService>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let (status, mut response) = mock.trigger_response.clone();
    if status.is_success() && response.get("job_id").is_none() {
        response["job_id"] = json!(format!(
            "job-{}_{}",
            body["evse_id"].as_str().unwrap_or_default(),
            body["connector_id"]
        ));
    }
    mock.trigger_bodies.lock().unwrap().push(body);
    (status, Json(response))
}

async fn status(
    State(mock): State<Arc<MockService>>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    mock.status_calls.fetch_add(1, Ordering::SeqCst);
    *mock
        .status_calls_by_job
        .lock()
        .unwrap()
        .entry(job_id.clone())
        .or_insert(0) += 1;

    let mut scripts = mock.scripts.lock().unwrap();
    let script = scripts
        .entry(job_id.clone())
        .or_insert_with(|| mock.default_script.clone().into());
    let (code, mut body) = if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script.front().cloned().unwrap()
    };
    if code.is_success() {
        body["job_id"] = json!(job_id);
    }
    (code, Json(body))
}

async fn result(Path(job_id): Path<String>) -> (StatusCode, Json<Value>) {
    if job_id == "job-1" {
        (
            StatusCode::OK,
            Json(json!({"job_id": job_id, "status": "completed", "result": {"anomalies": 56}})),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Job is not completed yet. Current status: running"})),
        )
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "timestamp": "2026-01-14T17:49:49"}))
}

async fn token() -> Json<Value> {
    Json(json!({"data": {"accessToken": "eyJhbGciOiJIUzI1NiJ9.payload.signature"}}))
}

async fn report_image(Path(device): Path<String>) -> StatusCode {
    if device == "EVSE123_2" {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn spawn_mock(mock: Arc<MockService>) -> String {
    let app = Router::new()
        .route("/api/v1/inference/trigger", post(trigger))
        .route("/api/v1/inference/status/:job_id", get(status))
        .route("/api/v1/inference/result/:job_id", get(result))
        .route("/health", get(health))
        .route("/token", get(token))
        .route(
            "/battery-reports/:device/battery_health_report.png",
            get(report_image),
        )
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn accepted() -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({"job_id": "job-1", "status": "pending", "message": "Job queued"}),
    )
}

fn running(progress: u8) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({"status": "running", "progress": progress, "message": "Running ML model..."}),
    )
}

fn completed() -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "status": "completed",
            "progress": 100,
            "message": "Analysis complete",
            "result": {
                "device_id": "EVSE123_2",
                "evse_id": "EVSE123",
                "connector_id": 2,
                "s3_bucket": "battery-ml-results",
                "s3_path": "battery-reports/EVSE123_2/",
                "timestamp": "20260114T174949Z"
            }
        }),
    )
}

fn client_for(base_url: &str) -> InferenceClient {
    let mut config = ClientConfig::new(base_url);
    config.report_bucket_url = base_url.to_string();
    config.request_timeout = Duration::from_secs(5);
    InferenceClient::new(&config).unwrap()
}

fn fast_poll() -> PollOptions {
    PollOptions {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_status_job_id_matches_trigger() {
    let mock = MockService::new(accepted(), vec![running(10)]);
    let client = client_for(&spawn_mock(mock).await);

    let handle = client
        .trigger(&InferenceRequest::new("EVSE123", 2))
        .await
        .unwrap();
    let status = client.fetch_status(&handle.job_id).await.unwrap();

    assert_eq!(handle.job_id, "job-1");
    assert_eq!(status.job_id, handle.job_id);
    assert_eq!(status.status, JobState::Running);
}

#[tokio::test]
async fn test_run_completes_after_two_fetches() {
    let mock = MockService::new(accepted(), vec![running(10), completed()]);
    let client = client_for(&spawn_mock(mock.clone()).await);
    let poller = JobPoller::new(client, fast_poll());
    let mut seen: Vec<JobStatus> = Vec::new();

    let request = InferenceRequest::new("EVSE123", 2);
    let status = poller
        .run(&request, |s| seen.push(s.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(status.is_completed());
    assert_eq!(status.progress, 100);
    assert_eq!(status.result.unwrap().device_id, "EVSE123_2");
    assert_eq!(mock.status_calls(), 2);
    assert_eq!(
        seen.iter().map(|s| s.progress).collect::<Vec<_>>(),
        vec![10, 100]
    );
    assert_eq!(
        mock.trigger_bodies.lock().unwrap().as_slice(),
        &[json!({"evse_id": "EVSE123", "connector_id": 2, "limit": 60})]
    );
}

#[tokio::test]
async fn test_trigger_500_is_submission_error_without_polling() {
    let mock = MockService::new(
        (StatusCode::INTERNAL_SERVER_ERROR, json!({"detail": "boom"})),
        vec![running(10)],
    );
    let client = client_for(&spawn_mock(mock.clone()).await);
    let poller = JobPoller::new(client, fast_poll());

    let err = poller
        .run(
            &InferenceRequest::new("EVSE123", 2),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::Submission { status: 500, .. }));
    assert!(err.to_string().contains("Internal Server Error"));
    assert_eq!(mock.status_calls(), 0);
}

#[tokio::test]
async fn test_status_404_is_status_fetch_error() {
    let mock = MockService::new(
        accepted(),
        vec![(StatusCode::NOT_FOUND, json!({"detail": "Job not found"}))],
    );
    let client = client_for(&spawn_mock(mock.clone()).await);
    let poller = JobPoller::new(client, fast_poll());

    let err = poller
        .run(
            &InferenceRequest::new("EVSE123", 2),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        InferenceError::StatusFetch {
            job_id,
            status,
            status_text,
            body,
        } => {
            assert_eq!(job_id, "job-1");
            assert_eq!(status, 404);
            assert_eq!(status_text, "Not Found");
            assert!(body.contains("Job not found"));
        }
        other => panic!("expected StatusFetch, got {other:?}"),
    }
    assert_eq!(mock.status_calls(), 1);
}

#[tokio::test]
async fn test_job_that_never_finishes_times_out() {
    let mock = MockService::new(accepted(), vec![running(50)]);
    let client = client_for(&spawn_mock(mock).await);
    let poller = JobPoller::new(
        client,
        PollOptions {
            interval: Duration::from_millis(20),
            timeout: Duration::from_millis(200),
        },
    );

    let started = std::time::Instant::now();
    let err = poller
        .poll("job-1", |_| {}, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::PollTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_failed_job_is_a_normal_return() {
    let mock = MockService::new(
        accepted(),
        vec![(
            StatusCode::OK,
            json!({"status": "failed", "progress": 40, "message": "ML inference failed: no data"}),
        )],
    );
    let client = client_for(&spawn_mock(mock).await);
    let poller = JobPoller::new(client, fast_poll());

    let status = poller
        .run(
            &InferenceRequest::new("EVSE123", 2),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(status.is_failed());
    assert!(status.message.contains("no data"));
}

#[tokio::test]
async fn test_fetch_result() {
    let mock = MockService::new(accepted(), vec![completed()]);
    let client = client_for(&spawn_mock(mock).await);

    let result = client.fetch_result("job-1").await.unwrap();
    assert_eq!(result["result"]["anomalies"], 56);

    let err = client.fetch_result("job-2").await.unwrap_err();
    assert!(matches!(err, InferenceError::ResultFetch { status: 400, .. }));
}

#[tokio::test]
async fn test_health_and_report_checks() {
    let mock = MockService::new(accepted(), vec![completed()]);
    let client = client_for(&spawn_mock(mock).await);

    assert_eq!(client.health().await.unwrap().status, "healthy");

    let ready: DeviceId = "EVSE123_2".parse().unwrap();
    let missing: DeviceId = "EVSE999_1".parse().unwrap();
    assert!(client.report_exists(&ready).await.unwrap());
    assert!(!client.report_exists(&missing).await.unwrap());
}

#[tokio::test]
async fn test_token_provider_reads_nested_token() {
    let mock = MockService::new(accepted(), vec![completed()]);
    let base = spawn_mock(mock).await;
    let client = client_for(&base);

    let token = client
        .token_provider(format!("{}/token", base))
        .fetch_token()
        .await
        .unwrap();
    assert_eq!(token, "eyJhbGciOiJIUzI1NiJ9.payload.signature");
}

#[tokio::test]
async fn test_concurrent_jobs_share_nothing() {
    let mock = MockService::with_scripts(
        (StatusCode::OK, json!({"status": "pending", "message": "Job queued"})),
        Vec::new(),
        vec![
            ("job-EVSE123_1", vec![running(30), completed()]),
            (
                "job-EVSE123_2",
                vec![
                    running(10),
                    running(20),
                    (
                        StatusCode::OK,
                        json!({"status": "failed", "progress": 20, "message": "No telemetry"}),
                    ),
                ],
            ),
        ],
    );
    let client = client_for(&spawn_mock(mock.clone()).await);
    let poller = JobPoller::new(client, fast_poll());

    let requests = vec![
        InferenceRequest::new("EVSE123", 1),
        InferenceRequest::new("EVSE123", 2),
    ];
    let results = poller.run_many(&requests, &CancellationToken::new()).await;

    let first = results[0].as_ref().unwrap();
    assert_eq!(first.job_id, "job-EVSE123_1");
    assert!(first.is_completed());
    assert_eq!(first.progress, 100);

    let second = results[1].as_ref().unwrap();
    assert_eq!(second.job_id, "job-EVSE123_2");
    assert!(second.is_failed());
    assert_eq!(second.message, "No telemetry");

    assert_eq!(mock.status_calls_for("job-EVSE123_1"), 2);
    assert_eq!(mock.status_calls_for("job-EVSE123_2"), 3);
    assert_eq!(mock.trigger_bodies.lock().unwrap().len(), 2);
}
