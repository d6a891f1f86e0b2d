// Selection domain model - drag-to-select over bucket bars

use super::signal::TimeWindow;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Hour,
    Minute,
}

impl Granularity {
    /// Width of one bucket at this granularity, in seconds.
    pub fn bucket_secs(&self) -> i64 {
        match self {
            Granularity::Day => 86_400,
            Granularity::Hour => 3_600,
            Granularity::Minute => 60,
        }
    }
}

/// A finalized, normalized index range over a bucket bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub granularity: Granularity,
    pub start_index: usize,
    pub end_index: usize,
}

impl Selection {
    /// Convert to the half-open time window covered by the selected buckets.
    /// A single-index selection spans exactly one bucket width.
    pub fn to_window(&self, parent_start: DateTime<Utc>) -> TimeWindow {
        let width = self.granularity.bucket_secs();
        let start = parent_start + Duration::seconds(self.start_index as i64 * width);
        let end = parent_start + Duration::seconds((self.end_index as i64 + 1) * width);
        TimeWindow { start, end }
    }
}

/// Live drag state over a bucket bar. Created on pointer-down, updated on
/// every pointer-move, finalized on pointer-up anywhere (the pointer may
/// leave the bar before release).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragState {
    pub granularity: Granularity,
    pub anchor_index: usize,
    pub current_index: usize,
}

impl DragState {
    pub fn begin(granularity: Granularity, index: usize, bucket_count: usize) -> Option<Self> {
        if bucket_count == 0 || index >= bucket_count {
            return None;
        }
        Some(Self {
            granularity,
            anchor_index: index,
            current_index: index,
        })
    }

    pub fn update(&mut self, index: usize, bucket_count: usize) {
        self.current_index = index.min(bucket_count.saturating_sub(1));
    }

    /// Normalize into a Selection regardless of drag direction.
    pub fn finalize(self) -> Selection {
        Selection {
            granularity: self.granularity,
            start_index: self.anchor_index.min(self.current_index),
            end_index: self.anchor_index.max(self.current_index),
        }
    }
}
