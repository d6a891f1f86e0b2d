// Waveform service - bounded-size decimated sample fetches
use crate::application::outcome::FetchOutcome;
use crate::application::signal_repository::SignalRepository;
use crate::domain::signal::{TimeWindow, WaveformSample};
use crate::infrastructure::config::PointBudgetSettings;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct DecimationRequest {
    pub pod: String,
    pub window: TimeWindow,
    /// Used verbatim when `> 0`; `None` or `<= 0` both select the
    /// duration-proportional auto budget.
    pub point_budget_override: Option<i64>,
}

#[derive(Clone)]
pub struct WaveformService {
    repository: Arc<dyn SignalRepository>,
    budget: PointBudgetSettings,
}

impl WaveformService {
    pub fn new(repository: Arc<dyn SignalRepository>, budget: PointBudgetSettings) -> Self {
        Self { repository, budget }
    }

    /// Maximum point count for a request: a positive override passes
    /// through unchanged, anything else derives from window duration so
    /// short windows are not over-decimated and long ones not over-fetched.
    pub fn resolve_budget(&self, request: &DecimationRequest) -> usize {
        match request.point_budget_override {
            Some(n) if n > 0 => n as usize,
            _ => {
                let proportional =
                    request.window.duration_secs() * self.budget.points_per_second;
                proportional.clamp(
                    self.budget.min_auto_points,
                    self.budget.max_auto_points,
                ) as usize
            }
        }
    }

    pub async fn fetch_waveform(
        &self,
        request: &DecimationRequest,
    ) -> FetchOutcome<Vec<WaveformSample>> {
        let max_points = self.resolve_budget(request);
        match self
            .repository
            .waveform_rows(
                &request.pod,
                request.window.start,
                request.window.end,
                max_points,
            )
            .await
        {
            Ok(samples) if samples.is_empty() => FetchOutcome::Empty,
            Ok(samples) => {
                tracing::debug!(
                    "pod {}: {} waveform samples for {}s window (budget {})",
                    request.pod,
                    samples.len(),
                    request.window.duration_secs(),
                    max_points
                );
                FetchOutcome::Ready(samples)
            }
            Err(e) => {
                tracing::error!("waveform query failed for pod {}: {}", request.pod, e);
                FetchOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::signal_repository::LeadStatRow;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    struct NoopRepository;

    #[async_trait]
    impl SignalRepository for NoopRepository {
        async fn list_pod_ids(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }
        async fn available_days(&self, _pod: &str) -> anyhow::Result<Vec<NaiveDate>> {
            Ok(vec![])
        }
        async fn lead_stat_rows(
            &self,
            _pod: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _bucket_secs: i64,
        ) -> anyhow::Result<Vec<LeadStatRow>> {
            Ok(vec![])
        }
        async fn waveform_rows(
            &self,
            _pod: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _max_points: usize,
        ) -> anyhow::Result<Vec<WaveformSample>> {
            Ok(vec![])
        }
    }

    fn service() -> WaveformService {
        WaveformService::new(Arc::new(NoopRepository), PointBudgetSettings::default())
    }

    fn request(override_points: Option<i64>, duration_secs: i64) -> DecimationRequest {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 7, 0, 0).unwrap();
        DecimationRequest {
            pod: "pod-1".to_string(),
            window: TimeWindow {
                start,
                end: start + chrono::Duration::seconds(duration_secs),
            },
            point_budget_override: override_points,
        }
    }

    #[test]
    fn test_positive_override_passes_verbatim() {
        assert_eq!(service().resolve_budget(&request(Some(500), 60)), 500);
        assert_eq!(service().resolve_budget(&request(Some(1), 86_400)), 1);
    }

    #[test]
    fn test_zero_and_absent_override_both_select_auto() {
        let svc = service();
        let auto = svc.resolve_budget(&request(None, 600));
        assert_eq!(svc.resolve_budget(&request(Some(0), 600)), auto);
        assert_eq!(svc.resolve_budget(&request(Some(-7), 600)), auto);
    }

    #[test]
    fn test_auto_budget_is_proportional_and_clamped() {
        let svc = service();
        let defaults = PointBudgetSettings::default();
        // 10 minutes at the default rate sits between the clamps
        assert_eq!(
            svc.resolve_budget(&request(None, 600)) as i64,
            600 * defaults.points_per_second
        );
        // one minute clamps up, a full day clamps down
        assert_eq!(
            svc.resolve_budget(&request(None, 60)) as i64,
            defaults.min_auto_points
        );
        assert_eq!(
            svc.resolve_budget(&request(None, 86_400)) as i64,
            defaults.max_auto_points
        );
    }
}
