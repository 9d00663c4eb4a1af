use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forecast_service::api::{create_router, AppState};
use forecast_service::cache::ForecastCache;
use forecast_service::config::Config;
use forecast_service::importers::WorkbookLoader;
use forecast_service::services::ForecastService;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,forecast_service=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;
    info!("Starting forecast service with config: {:?}", config);

    let loader = WorkbookLoader::from_config(&config);
    let forecast_service = ForecastService::new(loader, ForecastCache::global());

    // Warm the cache; a failed load is reported per request rather than stopping the server
    match forecast_service.summary().await {
        Ok(summary) => info!(
            "Loaded {} forecast rows ({} indicators, {} authorities)",
            summary.rows, summary.indicators, summary.authorities
        ),
        Err(e) => error!("Initial forecast load failed: {}", e),
    }

    // Create API router
    let app_state = AppState { forecast_service };
    let app = create_router(app_state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.server_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
