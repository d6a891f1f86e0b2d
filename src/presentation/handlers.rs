// HTTP request handlers
use crate::application::drilldown::{DrillDownController, DrillScript, ExplorerSession};
use crate::application::outcome::{ExplorerError, FetchOutcome};
use crate::application::waveform_service::DecimationRequest;
use crate::domain::signal::TimeWindow;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::json_response;
use crate::infrastructure::wire::{status_of, BucketDto, SampleDto, StatusDto, WindowDto};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false)
}

fn error_response(error: ExplorerError) -> Response {
    let status = match &error {
        ExplorerError::Service(_) => StatusCode::BAD_GATEWAY,
        ExplorerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(json!({ "status": "error", "error": error.to_string() })),
    )
        .into_response()
}

fn parse_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeWindow, ExplorerError> {
    TimeWindow::new(start, end)
        .ok_or_else(|| ExplorerError::InvalidRequest("end must be after start".to_string()))
}

/// List all pods with recorded data
pub async fn list_pods(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let compress = accepts_brotli(&headers);
    let pods = match state.repository.list_pod_ids().await {
        Ok(pods) => pods,
        Err(e) => {
            tracing::error!("Error listing pods: {}", e);
            return error_response(ExplorerError::Service(e));
        }
    };
    match json_response(&pods, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[derive(serde::Serialize)]
struct DaysResponse {
    pod: String,
    days: Vec<NaiveDate>,
}

/// Calendar days known to have data for a pod
pub async fn list_days(
    Path(pod): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let days = match state.repository.available_days(&pod).await {
        Ok(days) => days,
        Err(e) => {
            tracing::error!("Error fetching days for pod {}: {}", pod, e);
            return error_response(ExplorerError::Service(e));
        }
    };
    match json_response(&DaysResponse { pod, days }, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[derive(Deserialize)]
pub struct BucketQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bucket_secs: i64,
}

#[derive(serde::Serialize)]
struct BucketsResponse {
    pod: String,
    window: WindowDto,
    bucket_secs: i64,
    #[serde(flatten)]
    status: StatusDto,
    buckets: Vec<BucketDto>,
}

/// Gap-filled summary buckets over an arbitrary window
pub async fn get_buckets(
    Path(pod): Path<String>,
    Query(query): Query<BucketQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let window = match parse_window(query.start, query.end) {
        Ok(window) => window,
        Err(e) => return error_response(e),
    };
    if query.bucket_secs <= 0 {
        return error_response(ExplorerError::InvalidRequest(
            "bucket_secs must be positive".to_string(),
        ));
    }

    let outcome = state
        .bucket_service
        .fetch_buckets(&pod, window, query.bucket_secs)
        .await;
    let body = BucketsResponse {
        pod,
        window: window.into(),
        bucket_secs: query.bucket_secs,
        status: status_of(&outcome),
        buckets: outcome
            .as_ready()
            .map(|buckets| buckets.iter().map(BucketDto::from).collect())
            .unwrap_or_default(),
    };
    match json_response(&body, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[derive(Deserialize)]
pub struct WaveformQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_points: Option<i64>,
}

#[derive(serde::Serialize)]
struct WaveformResponse {
    pod: String,
    window: WindowDto,
    #[serde(flatten)]
    status: StatusDto,
    samples: Vec<SampleDto>,
}

/// Decimated waveform samples for a final window
pub async fn get_waveform(
    Path(pod): Path<String>,
    Query(query): Query<WaveformQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let window = match parse_window(query.start, query.end) {
        Ok(window) => window,
        Err(e) => return error_response(e),
    };

    let request = DecimationRequest {
        pod: pod.clone(),
        window,
        point_budget_override: query.max_points,
    };
    let outcome = state.waveform_service.fetch_waveform(&request).await;
    let body = WaveformResponse {
        pod,
        window: window.into(),
        status: status_of(&outcome),
        samples: match &outcome {
            FetchOutcome::Ready(samples) => samples.iter().map(SampleDto::from).collect(),
            _ => Vec::new(),
        },
    };
    match json_response(&body, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[derive(Deserialize)]
pub struct ExploreQuery {
    pub day: Option<NaiveDate>,
    pub hour_start: Option<usize>,
    pub hour_end: Option<usize>,
    pub minute_start: Option<usize>,
    pub minute_end: Option<usize>,
    pub max_points: Option<i64>,
}

/// Run a scripted drill-down for a pod, streaming each level's buckets,
/// every finalized window, the waveform, and a final close event. Omitting
/// the minute range selects hour-level granularity only.
pub async fn explore(
    Path(pod): Path<String>,
    Query(query): Query<ExploreQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);

    let script = DrillScript {
        day: query.day,
        hour_range: query.hour_start.map(|s| (s, query.hour_end.unwrap_or(s))),
        minute_range: query
            .minute_start
            .map(|s| (s, query.minute_end.unwrap_or(s))),
    };

    let controller = DrillDownController::new(
        pod,
        state.repository.clone(),
        state.bucket_service.clone(),
        state.waveform_service.clone(),
        script.minute_range.is_some(),
        query.max_points,
    );
    let (session, rx) = ExplorerSession::mount(controller);
    tokio::spawn(session.run_script(script));

    stream_from_receiver(rx, compress).await.into_response()
}
