// Mapper from domain models to their JSON wire shapes
use crate::application::drilldown::ExplorerEvent;
use crate::application::outcome::FetchOutcome;
use crate::domain::selection::Granularity;
use crate::domain::signal::{TimeBucket, TimeWindow, WaveformSample, CHANNEL_COUNT};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BucketDto {
    pub bucket_start: DateTime<Utc>,
    pub lead_on_p: [f64; CHANNEL_COUNT],
    pub lead_on_n: [f64; CHANNEL_COUNT],
    pub quality_percent: [f64; CHANNEL_COUNT],
    pub missing: bool,
    pub aggregate_quality: f64,
    pub aggregate_lead_on: f64,
}

impl From<&TimeBucket> for BucketDto {
    fn from(bucket: &TimeBucket) -> Self {
        Self {
            bucket_start: bucket.bucket_start,
            lead_on_p: bucket.lead_on_p,
            lead_on_n: bucket.lead_on_n,
            quality_percent: bucket.quality_percent,
            missing: bucket.missing,
            aggregate_quality: bucket.aggregate_quality(),
            aggregate_lead_on: bucket.aggregate_lead_on(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SampleDto {
    pub sample_time: DateTime<Utc>,
    pub channel_uv: [f64; CHANNEL_COUNT],
    pub lead_on_p: [bool; CHANNEL_COUNT],
    pub lead_on_n: [bool; CHANNEL_COUNT],
}

impl From<&WaveformSample> for SampleDto {
    fn from(sample: &WaveformSample) -> Self {
        Self {
            sample_time: sample.sample_time,
            channel_uv: sample.channel_uv,
            lead_on_p: sample.lead_on_p,
            lead_on_n: sample.lead_on_n,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WindowDto {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<TimeWindow> for WindowDto {
    fn from(window: TimeWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
        }
    }
}

/// Fetch outcome flattened into a status tag plus optional error text.
#[derive(Debug, Serialize)]
pub struct StatusDto {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn status_of<T>(outcome: &FetchOutcome<T>) -> StatusDto {
    match outcome {
        FetchOutcome::Loading => StatusDto {
            status: "loading",
            error: None,
        },
        FetchOutcome::Ready(_) => StatusDto {
            status: "ready",
            error: None,
        },
        FetchOutcome::Empty => StatusDto {
            status: "no_data",
            error: None,
        },
        FetchOutcome::Failed(message) => StatusDto {
            status: "error",
            error: Some(message.clone()),
        },
    }
}

fn granularity_name(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Day => "day",
        Granularity::Hour => "hour",
        Granularity::Minute => "minute",
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    AvailableDays {
        days: Vec<NaiveDate>,
    },
    Buckets {
        granularity: &'static str,
        parent_start: DateTime<Utc>,
        #[serde(flatten)]
        status: StatusDto,
        buckets: Vec<BucketDto>,
    },
    WindowFinalized {
        window: WindowDto,
    },
    Waveform {
        window: WindowDto,
        #[serde(flatten)]
        status: StatusDto,
        samples: Vec<SampleDto>,
    },
    Closed,
}

pub fn event_to_wire(event: ExplorerEvent) -> WireEvent {
    match event {
        ExplorerEvent::AvailableDays(days) => WireEvent::AvailableDays { days },
        ExplorerEvent::Buckets {
            granularity,
            parent_start,
            outcome,
        } => WireEvent::Buckets {
            granularity: granularity_name(granularity),
            parent_start,
            status: status_of(&outcome),
            buckets: outcome
                .as_ready()
                .map(|buckets| buckets.iter().map(BucketDto::from).collect())
                .unwrap_or_default(),
        },
        ExplorerEvent::WindowFinalized(window) => WireEvent::WindowFinalized {
            window: window.into(),
        },
        ExplorerEvent::Waveform { window, outcome } => WireEvent::Waveform {
            window: window.into(),
            status: status_of(&outcome),
            samples: outcome
                .as_ready()
                .map(|samples| samples.iter().map(SampleDto::from).collect())
                .unwrap_or_default(),
        },
        ExplorerEvent::Closed => WireEvent::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_failed_outcome_carries_message() {
        let outcome: FetchOutcome<Vec<TimeBucket>> =
            FetchOutcome::Failed("influx unreachable".to_string());
        let status = status_of(&outcome);
        assert_eq!(status.status, "error");
        assert_eq!(status.error.as_deref(), Some("influx unreachable"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 3, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap();
        let wire = event_to_wire(ExplorerEvent::WindowFinalized(TimeWindow { start, end }));
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["type"], "window_finalized");
        assert_eq!(json["window"]["start"], "2024-03-15T03:00:00Z");
    }

    #[test]
    fn test_empty_buckets_event_has_no_data_status() {
        let wire = event_to_wire(ExplorerEvent::Buckets {
            granularity: Granularity::Hour,
            parent_start: Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
            outcome: FetchOutcome::Empty,
        });
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["status"], "no_data");
        assert_eq!(json["buckets"].as_array().unwrap().len(), 0);
    }
}
