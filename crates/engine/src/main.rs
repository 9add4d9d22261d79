//! Grimoire Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grimoire_domain::SchemaRegistry;
use grimoire_engine::api;
use grimoire_engine::infrastructure::{
    clock::SystemClock,
    config::GrimoireConfig,
    filter_aliases::FilterAliases,
    http_provider::HttpContentProvider,
    importers::JsonDumpImporter,
    ports::{ClockPort, ContentProvider, EntityStore},
    sqlite::SqliteEntityStore,
};
use grimoire_engine::use_cases::content::FetchSettings;
use grimoire_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may be run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grimoire_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Grimoire Engine");

    let config = GrimoireConfig::from_env()?;

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock);
    let registry = Arc::new(SchemaRegistry::srd_defaults());

    tracing::info!(path = %config.db_path.display(), "Opening entity store");
    let sqlite = Arc::new(SqliteEntityStore::open(&config.db_path).await?);
    let store: Arc<dyn EntityStore> = sqlite.clone();

    let aliases = match &config.aliases_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading filter aliases");
            FilterAliases::from_json_file(path)?
        }
        None => FilterAliases::srd_defaults(),
    };

    tracing::info!(
        url = %config.provider_url,
        page_size = config.page_size,
        max_pages = config.max_pages,
        "Content provider configured"
    );
    let provider: Arc<dyn ContentProvider> = Arc::new(HttpContentProvider::new(
        &config.provider_url,
        config.provider_timeout,
        config.page_size,
        registry.clone(),
    )?);

    let settings = FetchSettings {
        max_pages: config.max_pages,
        deadline: config.fetch_deadline,
    };
    let app = Arc::new(App::new(
        store,
        provider,
        clock,
        registry,
        aliases,
        settings,
    ));

    if let Some(dir) = &config.import_dir {
        let importer = JsonDumpImporter::new(dir, config.import_batch_size);
        let report = app.content.import_dump(&importer).await?;
        tracing::info!(
            dir = %dir.display(),
            applied = report.applied(),
            rejected = report.rejected(),
            skipped = report.skipped(),
            "Dump import finished"
        );
    }

    let mut router = api::http::routes()
        .with_state(app)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer_from_env() {
        router = router.layer(cors);
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sqlite.close().await;
    tracing::info!("Entity store closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer_from_env() -> Option<CorsLayer> {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
