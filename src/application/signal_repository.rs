// Repository trait for biosignal data access
use crate::domain::signal::{WaveformSample, CHANNEL_COUNT};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// One raw per-bucket statistics row as returned by the aggregation query.
/// Rows for empty buckets may be omitted by the service; gap-filling is the
/// caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadStatRow {
    pub time_bucket: DateTime<Utc>,
    pub lead_on_p: [f64; CHANNEL_COUNT],
    pub lead_on_n: [f64; CHANNEL_COUNT],
    pub quality: [f64; CHANNEL_COUNT],
}

#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// List all pod identifiers with any recorded data
    async fn list_pod_ids(&self) -> anyhow::Result<Vec<String>>;

    /// Calendar dates known to have recorded data for a pod
    async fn available_days(&self, pod: &str) -> anyhow::Result<Vec<NaiveDate>>;

    /// Per-bucket lead/quality statistics over `[start, end)` at the given
    /// bucket width, ordered ascending
    async fn lead_stat_rows(
        &self,
        pod: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket_secs: i64,
    ) -> anyhow::Result<Vec<LeadStatRow>>;

    /// Decimated waveform samples over `[start, end)`, at most `max_points`
    /// of them, ordered non-decreasing by time
    async fn waveform_rows(
        &self,
        pod: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_points: usize,
    ) -> anyhow::Result<Vec<WaveformSample>>;
}
