use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use creaclips::app_state::AppState;
use creaclips::config::AppConfig;
use creaclips::routes;
use creaclips::services::{
    backgrounds::BackgroundCatalog,
    exporter::{CopyExporter, PublicPaths},
    fetcher::DefaultFetcher,
    job_manager::JobManager,
    job_store::JobStore,
    media::FfmpegMedia,
    pipeline::{PipelineExecutor, PipelineStages, SelectionDefaults},
    transcriber::WhisperTranscriber,
};

/// How long shutdown waits for running jobs to reach a stage boundary.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");
    let export_targets = config
        .export_targets()
        .expect("Invalid CREACLIPS_EXPORT_TARGETS");

    tracing::info!("Initializing creaclips server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_histogram!(
        "clip_job_processing_seconds",
        "Time from worker start to terminal state of a clip job"
    );
    metrics::describe_counter!("clip_jobs_total", "Total clip jobs submitted");
    metrics::describe_counter!("clip_jobs_completed", "Total clip jobs completed");
    metrics::describe_counter!("clip_jobs_failed", "Total clip jobs that failed");
    metrics::describe_gauge!("clip_jobs_running", "Clip jobs currently holding a worker");
    metrics::describe_gauge!("clip_queue_depth", "Clip jobs waiting for a worker");

    let jobs_dir = config.jobs_dir();
    tokio::fs::create_dir_all(&jobs_dir)
        .await
        .expect("Failed to create jobs directory");

    tracing::info!(dir = %config.background_dir.display(), "Loading background presets");
    let backgrounds = Arc::new(
        BackgroundCatalog::load(&config.background_dir)
            .await
            .expect("Failed to load background presets"),
    );

    let media = Arc::new(FfmpegMedia::new(Arc::clone(&backgrounds)));
    let stages = PipelineStages {
        fetcher: Arc::new(DefaultFetcher::new()),
        extractor: media.clone(),
        cutter: media.clone(),
        transcriber: Arc::new(WhisperTranscriber::new(
            &config.whisper_model,
            &config.whisper_language,
        )),
        compositor: media,
        exporter: Arc::new(CopyExporter::new(
            export_targets,
            PublicPaths::new(&config.data_dir, config.public_prefix()),
        )),
    };
    let defaults = SelectionDefaults {
        clip_length_seconds: config.clip_length_seconds,
        min_clip_length_seconds: config.min_clip_length_seconds,
        max_clips: config.max_clips,
        interval_seconds: config.default_interval_seconds,
    };

    let manager = Arc::new(JobManager::new(
        Arc::new(JobStore::new()),
        Arc::new(PipelineExecutor::new(stages, defaults)),
        jobs_dir,
        config.max_parallel_jobs,
    ));
    tracing::info!(max_parallel_jobs = manager.max_parallel_jobs(), "Job manager ready");

    if let Some(secs) = config.job_retention_secs {
        manager.spawn_retention_sweeper(Duration::from_secs(secs));
    }

    let bind_addr = config.bind_addr.clone();
    let body_limit = config.max_upload_mb * 1024 * 1024;
    let media_prefix = config.public_prefix();
    let media_files = ServeDir::new(&config.data_dir);
    let state = AppState::new(config, Arc::clone(&manager), backgrounds);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/backgrounds", get(routes::backgrounds::list_backgrounds))
        .route(
            "/jobs",
            get(routes::jobs::list_jobs).post(routes::jobs::create_job),
        )
        .route("/jobs/upload", post(routes::jobs::create_job_from_upload))
        .route("/jobs/{job_id}", get(routes::jobs::get_job))
        .with_state(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        );

    let app = if media_prefix == "/" {
        app.fallback_service(media_files)
    } else {
        app.nest_service(&media_prefix, media_files)
    };

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    if tokio::time::timeout(SHUTDOWN_GRACE, manager.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Jobs still running after shutdown grace period");
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
