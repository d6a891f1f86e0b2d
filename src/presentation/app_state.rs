// Application state for HTTP handlers
use crate::application::bucket_service::BucketAggregationService;
use crate::application::signal_repository::SignalRepository;
use crate::application::waveform_service::WaveformService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn SignalRepository>,
    pub bucket_service: BucketAggregationService,
    pub waveform_service: WaveformService,
}
