// Drill-down controller - day → hour → minute → waveform progression
use crate::application::bucket_service::BucketAggregationService;
use crate::application::outcome::FetchOutcome;
use crate::application::signal_repository::SignalRepository;
use crate::application::waveform_service::{DecimationRequest, WaveformService};
use crate::domain::selection::{DragState, Granularity};
use crate::domain::signal::{TimeBucket, TimeWindow, WaveformSample};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One granularity level of the drill-down: its bucket bar plus the live
/// drag over it. Drag is only permitted while the outcome is `Ready`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelState {
    pub granularity: Granularity,
    pub parent_start: DateTime<Utc>,
    pub outcome: FetchOutcome<Vec<TimeBucket>>,
    pub drag: Option<DragState>,
}

impl LevelState {
    fn loading(granularity: Granularity, parent_start: DateTime<Utc>) -> Self {
        Self {
            granularity,
            parent_start,
            outcome: FetchOutcome::Loading,
            drag: None,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.outcome.as_ready().map_or(0, Vec::len)
    }

    /// Drag interaction is disabled unless real buckets are loaded.
    pub fn drag_enabled(&self) -> bool {
        self.bucket_count() > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrillState {
    DaySelection {
        available_days: Vec<NaiveDate>,
    },
    HourSelection {
        day: NaiveDate,
        hours: LevelState,
    },
    MinuteSelection {
        day: NaiveDate,
        minutes: LevelState,
    },
    WaveformReady {
        day: NaiveDate,
        window: TimeWindow,
        outcome: FetchOutcome<Vec<WaveformSample>>,
    },
}

/// Orchestrates the granularity transitions. Selection state for a level is
/// cleared whenever its parent's identity changes, because every transition
/// replaces the tagged state wholesale. Superseded fetches are discarded by
/// a monotonic generation token captured at request time and checked in the
/// `apply_*` methods at completion time.
pub struct DrillDownController {
    pod: String,
    repository: Arc<dyn SignalRepository>,
    buckets: BucketAggregationService,
    waveform: WaveformService,
    /// When false, an hour-level drag finalizes straight to the waveform
    /// instead of refining into minute buckets.
    minute_refinement: bool,
    point_budget_override: Option<i64>,
    generation: u64,
    state: DrillState,
}

impl DrillDownController {
    pub fn new(
        pod: String,
        repository: Arc<dyn SignalRepository>,
        buckets: BucketAggregationService,
        waveform: WaveformService,
        minute_refinement: bool,
        point_budget_override: Option<i64>,
    ) -> Self {
        Self {
            pod,
            repository,
            buckets,
            waveform,
            minute_refinement,
            point_budget_override,
            generation: 0,
            state: DrillState::DaySelection {
                available_days: Vec::new(),
            },
        }
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    pub fn state(&self) -> &DrillState {
        &self.state
    }

    fn next_token(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn is_current(&self, token: u64) -> bool {
        token == self.generation
    }

    /// Populate the day picker. A failed lookup leaves an empty set; days
    /// gate which selections are possible, so there is nothing to drag over.
    pub async fn load_days(&mut self) -> &DrillState {
        let days = match self.repository.available_days(&self.pod).await {
            Ok(days) => days,
            Err(e) => {
                tracing::error!("day availability query failed for pod {}: {}", self.pod, e);
                Vec::new()
            }
        };
        self.state = DrillState::DaySelection {
            available_days: days,
        };
        &self.state
    }

    /// Pick a day: fetch its 24 hourly buckets. Replaces any finer-level
    /// state, which also cancels whatever fetch that state was waiting on.
    pub async fn select_day(&mut self, day: NaiveDate) -> &DrillState {
        let day_start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        let token = self.begin_hour_fetch(day, day_start);
        let window = TimeWindow {
            start: day_start,
            end: day_start + Duration::hours(24),
        };
        let outcome = self.buckets.fetch_buckets(&self.pod, window, 3_600).await;
        self.apply_hour_buckets(token, outcome);
        &self.state
    }

    fn begin_hour_fetch(&mut self, day: NaiveDate, day_start: DateTime<Utc>) -> u64 {
        let token = self.next_token();
        self.state = DrillState::HourSelection {
            day,
            hours: LevelState::loading(Granularity::Hour, day_start),
        };
        token
    }

    /// Completion half of the hourly fetch; a stale token means the fetch
    /// was superseded and its result is dropped without touching state.
    pub fn apply_hour_buckets(
        &mut self,
        token: u64,
        outcome: FetchOutcome<Vec<TimeBucket>>,
    ) -> bool {
        if !self.is_current(token) {
            tracing::debug!("discarding superseded hourly fetch (token {})", token);
            return false;
        }
        if let DrillState::HourSelection { hours, .. } = &mut self.state {
            hours.outcome = outcome;
            return true;
        }
        false
    }

    fn apply_minute_buckets(
        &mut self,
        token: u64,
        outcome: FetchOutcome<Vec<TimeBucket>>,
    ) -> bool {
        if !self.is_current(token) {
            tracing::debug!("discarding superseded minute fetch (token {})", token);
            return false;
        }
        if let DrillState::MinuteSelection { minutes, .. } = &mut self.state {
            minutes.outcome = outcome;
            return true;
        }
        false
    }

    fn apply_waveform(&mut self, token: u64, outcome: FetchOutcome<Vec<WaveformSample>>) -> bool {
        if !self.is_current(token) {
            tracing::debug!("discarding superseded waveform fetch (token {})", token);
            return false;
        }
        if let DrillState::WaveformReady { outcome: slot, .. } = &mut self.state {
            *slot = outcome;
            return true;
        }
        false
    }

    fn active_level_mut(&mut self) -> Option<&mut LevelState> {
        match &mut self.state {
            DrillState::HourSelection { hours, .. } => Some(hours),
            DrillState::MinuteSelection { minutes, .. } => Some(minutes),
            _ => None,
        }
    }

    /// Pointer-down over a bucket bar begins a drag. Refused when the level
    /// has no data to select over.
    pub fn pointer_down(&mut self, index: usize) -> bool {
        let Some(level) = self.active_level_mut() else {
            return false;
        };
        if !level.drag_enabled() {
            return false;
        }
        level.drag = DragState::begin(level.granularity, index, level.bucket_count());
        level.drag.is_some()
    }

    /// Pointer-move while a drag is active extends it, clamped to the bar.
    pub fn pointer_move(&mut self, index: usize) {
        let Some(level) = self.active_level_mut() else {
            return;
        };
        let count = level.bucket_count();
        if let Some(drag) = &mut level.drag {
            drag.update(index, count);
        }
    }

    /// Pointer-up anywhere finalizes the active drag (the pointer may have
    /// left the bar before release). Returns the finalized window, driving
    /// the next transition: hour → minute buckets (or straight to waveform
    /// in hour-only mode), minute → waveform.
    pub async fn pointer_up(&mut self) -> Option<TimeWindow> {
        let (day, granularity) = match &self.state {
            DrillState::HourSelection { day, .. } => (*day, Granularity::Hour),
            DrillState::MinuteSelection { day, .. } => (*day, Granularity::Minute),
            _ => return None,
        };
        let window = {
            let level = self.active_level_mut()?;
            let drag = level.drag.take()?;
            drag.finalize().to_window(level.parent_start)
        };

        match granularity {
            Granularity::Hour if self.minute_refinement => {
                let token = self.next_token();
                self.state = DrillState::MinuteSelection {
                    day,
                    minutes: LevelState::loading(Granularity::Minute, window.start),
                };
                let outcome = self.buckets.fetch_buckets(&self.pod, window, 60).await;
                self.apply_minute_buckets(token, outcome);
            }
            _ => self.enter_waveform(day, window).await,
        }

        Some(window)
    }

    async fn enter_waveform(&mut self, day: NaiveDate, window: TimeWindow) {
        let token = self.next_token();
        self.state = DrillState::WaveformReady {
            day,
            window,
            outcome: FetchOutcome::Loading,
        };
        let request = DecimationRequest {
            pod: self.pod.clone(),
            window,
            point_budget_override: self.point_budget_override,
        };
        let outcome = self.waveform.fetch_waveform(&request).await;
        self.apply_waveform(token, outcome);
    }
}

/// Events emitted by the mountable explorer view to external listeners:
/// each level's buckets, every finalized window, the waveform payload, and
/// a close signal when the user exits.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplorerEvent {
    AvailableDays(Vec<NaiveDate>),
    Buckets {
        granularity: Granularity,
        parent_start: DateTime<Utc>,
        outcome: FetchOutcome<Vec<TimeBucket>>,
    },
    WindowFinalized(TimeWindow),
    Waveform {
        window: TimeWindow,
        outcome: FetchOutcome<Vec<WaveformSample>>,
    },
    Closed,
}

/// A scripted drill-down, as supplied by the explore endpoint's query
/// string. Absent ranges stop the descent at the level above.
#[derive(Debug, Clone, Default)]
pub struct DrillScript {
    pub day: Option<NaiveDate>,
    pub hour_range: Option<(usize, usize)>,
    pub minute_range: Option<(usize, usize)>,
}

/// The upward-facing contract: mounts on a pod (optionally with an initial
/// day) and emits `ExplorerEvent`s over an mpsc channel to any listener.
pub struct ExplorerSession {
    controller: DrillDownController,
    tx: mpsc::Sender<ExplorerEvent>,
}

impl ExplorerSession {
    pub fn mount(
        controller: DrillDownController,
    ) -> (Self, mpsc::Receiver<ExplorerEvent>) {
        let (tx, rx) = mpsc::channel(100);
        (Self { controller, tx }, rx)
    }

    async fn emit(&self, event: ExplorerEvent) {
        let _ = self.tx.send(event).await;
    }

    async fn emit_level(&self) {
        let level = match self.controller.state() {
            DrillState::HourSelection { hours, .. } => hours,
            DrillState::MinuteSelection { minutes, .. } => minutes,
            _ => return,
        };
        self.emit(ExplorerEvent::Buckets {
            granularity: level.granularity,
            parent_start: level.parent_start,
            outcome: level.outcome.clone(),
        })
        .await;
    }

    async fn emit_waveform(&self) {
        if let DrillState::WaveformReady {
            window, outcome, ..
        } = self.controller.state()
        {
            self.emit(ExplorerEvent::Waveform {
                window: *window,
                outcome: outcome.clone(),
            })
            .await;
        }
    }

    async fn drag(&mut self, range: (usize, usize)) -> Option<TimeWindow> {
        if !self.controller.pointer_down(range.0) {
            return None;
        }
        self.controller.pointer_move(range.1);
        self.controller.pointer_up().await
    }

    /// Run a scripted drill-down to completion, emitting events at each
    /// step, then close. Descent stops early at a level with no data.
    pub async fn run_script(mut self, script: DrillScript) {
        let days = match self.controller.load_days().await {
            DrillState::DaySelection { available_days } => available_days.clone(),
            _ => Vec::new(),
        };
        self.emit(ExplorerEvent::AvailableDays(days)).await;

        'drill: {
            let Some(day) = script.day else { break 'drill };
            self.controller.select_day(day).await;
            self.emit_level().await;

            let Some(hour_range) = script.hour_range else {
                break 'drill;
            };
            let Some(window) = self.drag(hour_range).await else {
                break 'drill;
            };
            self.emit(ExplorerEvent::WindowFinalized(window)).await;

            match self.controller.state() {
                DrillState::MinuteSelection { .. } => {
                    self.emit_level().await;
                    let Some(minute_range) = script.minute_range else {
                        break 'drill;
                    };
                    let Some(window) = self.drag(minute_range).await else {
                        break 'drill;
                    };
                    self.emit(ExplorerEvent::WindowFinalized(window)).await;
                    self.emit_waveform().await;
                }
                DrillState::WaveformReady { .. } => {
                    self.emit_waveform().await;
                }
                _ => {}
            }
        }

        self.emit(ExplorerEvent::Closed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::signal_repository::LeadStatRow;
    use crate::domain::signal::CHANNEL_COUNT;
    use crate::infrastructure::config::PointBudgetSettings;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory repository: one pod, stats every bucket, one waveform
    /// sample per second. Can be switched to fail or go silent.
    #[derive(Default)]
    struct FakeRepository {
        fail: AtomicBool,
        silent: AtomicBool,
    }

    #[async_trait]
    impl SignalRepository for FakeRepository {
        async fn list_pod_ids(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["pod-1".to_string()])
        }

        async fn available_days(&self, _pod: &str) -> anyhow::Result<Vec<NaiveDate>> {
            Ok(vec![NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()])
        }

        async fn lead_stat_rows(
            &self,
            _pod: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            bucket_secs: i64,
        ) -> anyhow::Result<Vec<LeadStatRow>> {
            if self.fail.load(Ordering::Relaxed) {
                anyhow::bail!("influx unreachable");
            }
            if self.silent.load(Ordering::Relaxed) {
                return Ok(vec![]);
            }
            let count = (end - start).num_seconds() / bucket_secs;
            Ok((0..count)
                .map(|i| LeadStatRow {
                    time_bucket: start + Duration::seconds(i * bucket_secs),
                    lead_on_p: [0.9; CHANNEL_COUNT],
                    lead_on_n: [0.9; CHANNEL_COUNT],
                    quality: [85.0; CHANNEL_COUNT],
                })
                .collect())
        }

        async fn waveform_rows(
            &self,
            _pod: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            max_points: usize,
        ) -> anyhow::Result<Vec<WaveformSample>> {
            if self.fail.load(Ordering::Relaxed) {
                anyhow::bail!("influx unreachable");
            }
            let count = ((end - start).num_seconds() as usize).min(max_points);
            Ok((0..count)
                .map(|i| WaveformSample {
                    sample_time: start + Duration::seconds(i as i64),
                    channel_uv: [i as f64; CHANNEL_COUNT],
                    lead_on_p: [true; CHANNEL_COUNT],
                    lead_on_n: [true; CHANNEL_COUNT],
                })
                .collect())
        }
    }

    fn controller_with(repo: Arc<FakeRepository>, minute_refinement: bool) -> DrillDownController {
        let repository: Arc<dyn SignalRepository> = repo;
        DrillDownController::new(
            "pod-1".to_string(),
            repository.clone(),
            BucketAggregationService::new(repository.clone()),
            WaveformService::new(repository, PointBudgetSettings::default()),
            minute_refinement,
            None,
        )
    }

    fn controller(minute_refinement: bool) -> DrillDownController {
        controller_with(Arc::new(FakeRepository::default()), minute_refinement)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[tokio::test]
    async fn test_select_day_loads_24_hourly_buckets() {
        let mut ctl = controller(true);
        ctl.select_day(day()).await;
        let DrillState::HourSelection { hours, .. } = ctl.state() else {
            panic!("expected HourSelection");
        };
        assert_eq!(hours.bucket_count(), 24);
        assert!(hours.drag_enabled());
    }

    #[tokio::test]
    async fn test_hour_drag_refines_into_minutes() {
        let mut ctl = controller(true);
        ctl.select_day(day()).await;
        assert!(ctl.pointer_down(3));
        ctl.pointer_move(5);
        let window = ctl.pointer_up().await.unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 15, 3, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap());
        let DrillState::MinuteSelection { minutes, .. } = ctl.state() else {
            panic!("expected MinuteSelection");
        };
        // 3 selected hours at 60s buckets
        assert_eq!(minutes.bucket_count(), 180);
    }

    #[tokio::test]
    async fn test_hour_only_mode_goes_straight_to_waveform() {
        let mut ctl = controller(false);
        ctl.select_day(day()).await;
        assert!(ctl.pointer_down(7));
        let window = ctl.pointer_up().await.unwrap();
        assert_eq!(window.duration_secs(), 3_600);
        let DrillState::WaveformReady { outcome, .. } = ctl.state() else {
            panic!("expected WaveformReady");
        };
        assert!(outcome.is_ready());
    }

    #[tokio::test]
    async fn test_minute_click_yields_one_minute_window() {
        let mut ctl = controller(true);
        ctl.select_day(day()).await;
        ctl.pointer_down(7);
        ctl.pointer_up().await;
        // single click on minute bucket 10 inside hour 7
        assert!(ctl.pointer_down(10));
        let window = ctl.pointer_up().await.unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 15, 7, 10, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 3, 15, 7, 11, 0).unwrap());
    }

    #[tokio::test]
    async fn test_reverse_drag_matches_forward_drag() {
        let mut forward = controller(true);
        forward.select_day(day()).await;
        forward.pointer_down(3);
        forward.pointer_move(5);
        let a = forward.pointer_up().await.unwrap();

        let mut backward = controller(true);
        backward.select_day(day()).await;
        backward.pointer_down(5);
        backward.pointer_move(3);
        let b = backward.pointer_up().await.unwrap();

        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_new_day_resets_child_selection() {
        let mut ctl = controller(true);
        ctl.select_day(day()).await;
        ctl.pointer_down(3);
        ctl.pointer_move(5);
        ctl.pointer_up().await;
        // re-pick the day mid-descent: back to a fresh hour level, no drag
        ctl.select_day(day()).await;
        let DrillState::HourSelection { hours, .. } = ctl.state() else {
            panic!("expected HourSelection after reselect");
        };
        assert!(hours.drag.is_none());
    }

    #[tokio::test]
    async fn test_no_data_disables_drag() {
        let repo = Arc::new(FakeRepository::default());
        repo.silent.store(true, Ordering::Relaxed);
        let mut ctl = controller_with(repo, true);
        ctl.select_day(day()).await;
        let DrillState::HourSelection { hours, .. } = ctl.state() else {
            panic!("expected HourSelection");
        };
        assert_eq!(hours.outcome, FetchOutcome::Empty);
        assert!(!ctl.pointer_down(0));
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_not_panics() {
        let repo = Arc::new(FakeRepository::default());
        repo.fail.store(true, Ordering::Relaxed);
        let mut ctl = controller_with(repo, true);
        ctl.select_day(day()).await;
        let DrillState::HourSelection { hours, .. } = ctl.state() else {
            panic!("expected HourSelection");
        };
        assert!(matches!(hours.outcome, FetchOutcome::Failed(_)));
        assert!(!ctl.pointer_down(0));
    }

    #[tokio::test]
    async fn test_stale_fetch_result_is_discarded() {
        let mut ctl = controller(true);
        ctl.select_day(day()).await;
        let stale_token = ctl.generation;
        // a newer request supersedes the old token
        ctl.select_day(day()).await;
        assert!(!ctl.apply_hour_buckets(stale_token, FetchOutcome::Empty));
        let DrillState::HourSelection { hours, .. } = ctl.state() else {
            panic!("expected HourSelection");
        };
        assert_eq!(hours.bucket_count(), 24);
    }

    #[tokio::test]
    async fn test_scripted_session_emits_full_event_sequence() {
        let (session, mut rx) = ExplorerSession::mount(controller(true));
        let script = DrillScript {
            day: Some(day()),
            hour_range: Some((3, 5)),
            minute_range: Some((0, 9)),
        };
        tokio::spawn(session.run_script(script));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events[0], ExplorerEvent::AvailableDays(_)));
        assert!(matches!(
            events[1],
            ExplorerEvent::Buckets {
                granularity: Granularity::Hour,
                ..
            }
        ));
        assert!(matches!(events[2], ExplorerEvent::WindowFinalized(_)));
        assert!(matches!(
            events[3],
            ExplorerEvent::Buckets {
                granularity: Granularity::Minute,
                ..
            }
        ));
        assert!(matches!(events[4], ExplorerEvent::WindowFinalized(_)));
        assert!(matches!(events[5], ExplorerEvent::Waveform { .. }));
        assert_eq!(events.last(), Some(&ExplorerEvent::Closed));
    }

    #[tokio::test]
    async fn test_session_without_day_only_lists_days() {
        let (session, mut rx) = ExplorerSession::mount(controller(true));
        tokio::spawn(session.run_script(DrillScript::default()));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ExplorerEvent::AvailableDays(_)));
        assert_eq!(events[1], ExplorerEvent::Closed);
    }
}
