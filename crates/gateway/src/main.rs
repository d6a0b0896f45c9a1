//! RagBridge API Gateway
//!
//! The HTTP surface over the managed File Search provider. Handles:
//! - Query routes (search, ask, summarize, batch)
//! - Document intake (multipart, URL, directory)
//! - Store management
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use ragbridge_common::{
    config::AppConfig,
    documents::DocumentIntake,
    gemini::{self, FileSearchProvider},
    metrics,
    search::SearchEngine,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers. Built once at startup;
/// every handler sees the same provider handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub provider: Arc<dyn FileSearchProvider>,
    pub engine: Arc<SearchEngine>,
    pub intake: Arc<DocumentIntake>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    init_tracing(&config);
    info!("Starting RagBridge gateway v{}", ragbridge_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
        info!(port = config.observability.metrics_port, "Metrics exporter listening");
    }

    // Construct the provider once and inject it everywhere
    let provider = gemini::create_provider(&config.provider)?;
    let engine = Arc::new(SearchEngine::new(
        provider.clone(),
        config.provider.model.clone(),
    ));
    let intake = Arc::new(DocumentIntake::new(provider.clone(), &config.intake));

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        provider,
        engine,
        intake,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Multipart uploads must fit the configured file ceiling plus
    // envelope overhead
    let body_limit = DefaultBodyLimit::max(state.config.max_file_size_bytes() as usize + 64 * 1024);

    let api_routes = Router::new()
        // Query endpoints
        .route("/search", post(handlers::query::search))
        .route("/ask", post(handlers::query::ask))
        .route("/search/multi", post(handlers::query::search_multi))
        .route("/search/batch", post(handlers::query::search_batch))
        .route("/summarize", post(handlers::query::summarize))
        // Intake endpoints
        .route("/upload", post(handlers::upload::upload_file))
        .route("/upload-url", post(handlers::upload::upload_from_url))
        .route("/upload-directory", post(handlers::upload::upload_directory))
        // Store endpoints
        .route(
            "/stores",
            get(handlers::stores::list_stores).post(handlers::stores::create_store),
        )
        .route("/stores/{store_name}", delete(handlers::stores::delete_store))
        .route(
            "/stores/{store_name}/documents",
            get(handlers::stores::list_store_documents),
        )
        .route("/store-info/{store_name}", get(handlers::stores::store_info));

    let mut app = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .nest("/api", api_routes)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id);

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum_middleware::from_fn(move |request, next| {
            let limiter = limiter.clone();
            async move { middleware::rate_limit::rate_limit_middleware(request, next, limiter).await }
        }));
    }

    app.with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
