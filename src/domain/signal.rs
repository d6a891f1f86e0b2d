// Signal domain models - buckets, windows, samples

use chrono::{DateTime, Duration, Utc};

/// Number of recorded biosignal channels per pod.
pub const CHANNEL_COUNT: usize = 3;

/// One fixed-width slot of summary statistics over the raw signal.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucket {
    pub bucket_start: DateTime<Utc>,
    /// Fraction of the bucket each channel held electrode contact, in [0, 1].
    pub lead_on_p: [f64; CHANNEL_COUNT],
    pub lead_on_n: [f64; CHANNEL_COUNT],
    /// Per-channel signal quality score, in [0, 100].
    pub quality_percent: [f64; CHANNEL_COUNT],
    /// True when the aggregation service returned no row for this slot.
    pub missing: bool,
}

impl TimeBucket {
    pub fn missing(bucket_start: DateTime<Utc>) -> Self {
        Self {
            bucket_start,
            lead_on_p: [0.0; CHANNEL_COUNT],
            lead_on_n: [0.0; CHANNEL_COUNT],
            quality_percent: [0.0; CHANNEL_COUNT],
            missing: true,
        }
    }

    /// Mean channel quality, rescaled to [0, 1].
    pub fn aggregate_quality(&self) -> f64 {
        self.quality_percent.iter().sum::<f64>() / CHANNEL_COUNT as f64 / 100.0
    }

    /// Mean of the per-channel lead-on fractions, P and N contacts averaged.
    pub fn aggregate_lead_on(&self) -> f64 {
        let sum: f64 = (0..CHANNEL_COUNT)
            .map(|i| (self.lead_on_p[i] + self.lead_on_n[i]) / 2.0)
            .sum();
        sum / CHANNEL_COUNT as f64
    }

    pub fn per_channel_lead_on(&self, channel: usize) -> f64 {
        (self.lead_on_p[channel] + self.lead_on_n[channel]) / 2.0
    }
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Returns None unless `end > start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Number of whole buckets of `bucket_secs` that fit in the window.
    pub fn bucket_count(&self, bucket_secs: i64) -> usize {
        if bucket_secs <= 0 {
            return 0;
        }
        ((self.end - self.start).num_seconds() / bucket_secs).max(0) as usize
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

/// One decimated waveform point. Sequences are ordered non-decreasing by
/// time and replaced wholesale on every fetch, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSample {
    pub sample_time: DateTime<Utc>,
    /// Amplitude per channel, microvolts.
    pub channel_uv: [f64; CHANNEL_COUNT],
    pub lead_on_p: [bool; CHANNEL_COUNT],
    pub lead_on_n: [bool; CHANNEL_COUNT],
}

impl WaveformSample {
    /// A channel is drawable only while both contacts are on.
    pub fn lead_on(&self, channel: usize) -> bool {
        self.lead_on_p[channel] && self.lead_on_n[channel]
    }
}
