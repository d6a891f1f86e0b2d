// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use biosignal_explorer::application::bucket_service::BucketAggregationService;
use biosignal_explorer::application::signal_repository::SignalRepository;
use biosignal_explorer::application::waveform_service::WaveformService;
use biosignal_explorer::infrastructure::config::{load_explorer_config, load_influx_config};
use biosignal_explorer::infrastructure::influx_repository::InfluxRepository;
use biosignal_explorer::presentation::app_state::AppState;
use biosignal_explorer::presentation::handlers::{
    explore, get_buckets, get_waveform, health_check, list_days, list_pods,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let influx_config = load_influx_config()?;
    let explorer_config = load_explorer_config()?;

    // Create repository (infrastructure layer)
    let repository: Arc<dyn SignalRepository> = Arc::new(InfluxRepository::new(
        influx_config.influx.host,
        influx_config.influx.token,
        influx_config.influx.database,
        influx_config.influx.retention_policy,
    ));

    // Create services (application layer)
    let bucket_service = BucketAggregationService::new(repository.clone());
    let waveform_service =
        WaveformService::new(repository.clone(), explorer_config.point_budget);

    // Create application state
    let state = Arc::new(AppState {
        repository,
        bucket_service,
        waveform_service,
    });

    // Build router (presentation layer)
    // Note: list/stream payloads are Brotli-compressed manually in the
    // response builders, so no CompressionLayer here
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/pods", get(list_pods))
        .route("/pods/:pod/days", get(list_days))
        .route("/pods/:pod/buckets", get(get_buckets))
        .route("/pods/:pod/waveform", get(get_waveform))
        .route("/pods/:pod/explore", get(explore))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
    println!("Starting biosignal-explorer service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
