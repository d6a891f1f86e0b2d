// Application layer - use cases over the repository port
pub mod bucket_service;
pub mod drilldown;
pub mod outcome;
pub mod signal_repository;
pub mod waveform_service;
