use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use fieldsense_analysis::AnalysisPipeline;
use fieldsense_core::config::LayeredConfig;
use fieldsense_store::{MemoryMetadataStore, MetadataStore, PostgresConfig, PostgresStore};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldsense_api::{create_router, ApiConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsense_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_config = ApiConfig::from_env();

    let mut layered = LayeredConfig::with_defaults();
    if let Some(path) = &api_config.config_file {
        layered = layered
            .load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
    }
    let layered = layered.load_from_env();
    let settings = layered.settings().context("Invalid analysis configuration")?;

    tracing::info!(
        port = api_config.port,
        export_dir = %settings.export_dir.display(),
        cloud_cover_threshold = settings.cloud_cover_threshold,
        window_days = ?settings.window_days,
        "Starting FieldSense API server"
    );

    let engine =
        fieldsense_raster::connect(layered.engine_url.value.as_deref(), settings.engine_timeout)
            .context("Failed to set up the raster engine")?;
    tracing::info!(engine = engine.name(), "Raster engine ready");

    // Initialize storage backend based on DATABASE_URL environment variable
    let store: Arc<dyn MetadataStore> = match &api_config.database_url {
        Some(database_url) => {
            tracing::info!("DATABASE_URL found, connecting to PostgreSQL...");
            match init_postgres_storage(database_url).await {
                Ok(store) => {
                    tracing::info!("Connected to PostgreSQL");
                    store
                }
                Err(e) => {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    tracing::error!(
                        "Remediation:\n\
                        1. Ensure PostgreSQL is running\n\
                        2. Verify DATABASE_URL is correct\n\
                        3. Check that the database exists and is accessible"
                    );
                    return Err(e);
                }
            }
        }
        None => {
            tracing::info!("Using in-memory storage (set DATABASE_URL for PostgreSQL)");
            Arc::new(MemoryMetadataStore::new())
        }
    };

    tokio::fs::create_dir_all(&settings.export_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.export_dir.display()))?;

    let pipeline = AnalysisPipeline::new(engine, store.clone(), &settings)?;
    let state = Arc::new(AppState::new(Arc::new(pipeline), store));

    let origin = api_config
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid FIELDSENSE_CORS_ORIGIN '{}'", api_config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = create_router(state).layer(cors);

    let addr = api_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("CORS enabled for {}", api_config.cors_origin);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize PostgreSQL storage from a database URL
async fn init_postgres_storage(database_url: &str) -> anyhow::Result<Arc<dyn MetadataStore>> {
    let config = PostgresConfig::new(database_url.to_string()).context("Invalid DATABASE_URL")?;
    let store = PostgresStore::with_migrations(config).await.context("Connection failed")?;
    Ok(Arc::new(store))
}
