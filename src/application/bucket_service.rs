// Bucket aggregation service - gap-filled summary statistics per time slot
use crate::application::outcome::FetchOutcome;
use crate::application::signal_repository::{LeadStatRow, SignalRepository};
use crate::domain::signal::{TimeBucket, TimeWindow};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct BucketAggregationService {
    repository: Arc<dyn SignalRepository>,
}

impl BucketAggregationService {
    pub fn new(repository: Arc<dyn SignalRepository>) -> Self {
        Self { repository }
    }

    /// Fetch summary buckets for `[start, end)` at `bucket_secs` width.
    /// Always yields the exact expected bucket count on success; slots the
    /// service omitted come back as `missing` sentinels. A window with no
    /// real rows at all is an `Empty` outcome, a transport failure is
    /// `Failed` — neither propagates as an error to the caller.
    pub async fn fetch_buckets(
        &self,
        pod: &str,
        window: TimeWindow,
        bucket_secs: i64,
    ) -> FetchOutcome<Vec<TimeBucket>> {
        let expected = window.bucket_count(bucket_secs);
        if expected == 0 {
            return FetchOutcome::Empty;
        }

        let rows = match self
            .repository
            .lead_stat_rows(pod, window.start, window.end, bucket_secs)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("bucket aggregation query failed for pod {}: {}", pod, e);
                return FetchOutcome::Failed(e.to_string());
            }
        };

        let (buckets, filled) = gap_fill(window.start, bucket_secs, expected, rows);
        tracing::debug!(
            "pod {}: {} of {} buckets filled at {}s width",
            pod,
            filled,
            expected,
            bucket_secs
        );

        if filled == 0 {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Ready(buckets)
        }
    }
}

/// Dense-array reconciliation: pre-allocate `expected` missing sentinels,
/// scatter real rows by their computed slot index, drop anything that lands
/// out of bounds. Returns the array and how many slots got real data.
pub fn gap_fill(
    start: DateTime<Utc>,
    bucket_secs: i64,
    expected: usize,
    rows: Vec<LeadStatRow>,
) -> (Vec<TimeBucket>, usize) {
    let mut buckets: Vec<TimeBucket> = (0..expected)
        .map(|i| TimeBucket::missing(start + Duration::seconds(i as i64 * bucket_secs)))
        .collect();

    let mut filled = 0usize;
    for row in rows {
        let offset_secs = (row.time_bucket - start).num_seconds() as f64;
        let index = (offset_secs / bucket_secs as f64).round();
        if index < 0.0 || index as usize >= expected {
            tracing::warn!(
                "dropping out-of-range bucket row at {} (window start {})",
                row.time_bucket,
                start
            );
            continue;
        }
        let slot = &mut buckets[index as usize];
        if slot.missing {
            filled += 1;
        }
        slot.lead_on_p = row.lead_on_p;
        slot.lead_on_n = row.lead_on_n;
        slot.quality_percent = row.quality;
        slot.missing = false;
    }

    (buckets, filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn row(time_secs: i64) -> LeadStatRow {
        LeadStatRow {
            time_bucket: t(time_secs),
            lead_on_p: [1.0; 3],
            lead_on_n: [1.0; 3],
            quality: [80.0; 3],
        }
    }

    #[test]
    fn test_gap_fill_length_and_timestamps() {
        let (buckets, filled) = gap_fill(t(0), 3600, 24, vec![row(3600), row(7200)]);
        assert_eq!(buckets.len(), 24);
        assert_eq!(filled, 2);
        for (i, b) in buckets.iter().enumerate() {
            assert_eq!(b.bucket_start, t(i as i64 * 3600));
        }
        assert!(buckets[0].missing);
        assert!(!buckets[1].missing);
        assert!(!buckets[2].missing);
        assert!(buckets[3].missing);
    }

    #[test]
    fn test_gap_fill_drops_out_of_range_rows() {
        let (buckets, filled) = gap_fill(t(0), 60, 10, vec![row(-60), row(6000), row(120)]);
        assert_eq!(buckets.len(), 10);
        assert_eq!(filled, 1);
        assert!(!buckets[2].missing);
    }

    #[test]
    fn test_gap_fill_rounds_jittered_timestamps() {
        // A row 2 seconds off its nominal slot still lands in that slot
        let (buckets, filled) = gap_fill(t(0), 60, 5, vec![row(178)]);
        assert_eq!(filled, 1);
        assert!(!buckets[3].missing);
    }

    #[test]
    fn test_missing_slots_are_zeroed_sentinels() {
        let (buckets, _) = gap_fill(t(0), 60, 3, vec![]);
        for b in &buckets {
            assert!(b.missing);
            assert_eq!(b.aggregate_lead_on(), 0.0);
            assert_eq!(b.aggregate_quality(), 0.0);
        }
    }
}
