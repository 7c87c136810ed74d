use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use quizgen::app_state::AppState;
use quizgen::config::AppConfig;
use quizgen::routes;
use quizgen::services::generator::GeminiClient;
use quizgen::services::ingest::{ArticleExtractor, YtDlpFetcher};
use quizgen::services::orchestrator::QuizOrchestrator;
use quizgen::services::poller::PollPolicy;
use quizgen::services::store::{JobStore, RedisJobStore};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing quizgen server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("quiz_jobs_submitted_total", "Total quiz jobs submitted");
    metrics::describe_counter!("quiz_jobs_completed_total", "Total quiz jobs completed");
    metrics::describe_counter!("quiz_jobs_failed_total", "Total quiz jobs that failed");
    metrics::describe_histogram!(
        "quiz_generation_seconds",
        "Time from job pickup to terminal status"
    );

    // Media downloads land here before upload to the generation service
    tracing::info!(path = %config.temp_dir.display(), "Preparing media temp directory");
    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .expect("Failed to create media temp directory");

    tracing::info!("Connecting to Redis job store");
    let store: Arc<dyn JobStore> = Arc::new(
        RedisJobStore::new(&config.redis_url).expect("Failed to initialize job store"),
    );

    tracing::info!("Initializing Gemini client");
    let generator = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));

    let extractor =
        Arc::new(ArticleExtractor::new().expect("Failed to initialize article extractor"));
    let fetcher = Arc::new(YtDlpFetcher::new(
        config.yt_dlp_path.clone(),
        config.temp_dir.clone(),
    ));

    let poll_policy = PollPolicy {
        interval: std::time::Duration::from_secs(config.poll_interval_secs),
        max_attempts: config.poll_max_attempts,
    };

    let orchestrator = Arc::new(QuizOrchestrator::new(
        Arc::clone(&store),
        extractor,
        fetcher,
        generator,
        poll_policy,
    ));

    // Create shared application state
    let state = AppState::new(store, orchestrator);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/quiz", post(routes::quiz::submit_quiz))
        .route("/api/v1/quiz/{job_id}", get(routes::quiz::get_job_status))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // JSON bodies only

    tracing::info!("Starting quizgen on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
