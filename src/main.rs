use axum::http::{header, HeaderValue, Method};
use opendal::services::{Fs, S3};
use opendal::Operator;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cerfa_filler::cerfa::convert::SvgConverter;
use cerfa_filler::cerfa::render::ReceiptTemplates;
use cerfa_filler::cerfa::ReceiptPipeline;
use cerfa_filler::config::{AppConfig, StorageConfig};
use cerfa_filler::{build_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    // Initialize Tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cerfa_filler=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CERFA filler...");
    let config = AppConfig::from_env()?;

    // Database Setup
    tracing::info!("Initializing database connection pool at {}...", config.database_path);
    let db_pool = db::init_pool(&config.database_path, config.db_pool_size).await?;
    tracing::info!("Database connection pool initialized successfully");

    let storage = storage_operator(&config.storage)?;

    let templates = match &config.template_dir {
        Some(dir) => {
            tracing::info!("Loading receipt templates from {}", dir.display());
            ReceiptTemplates::from_dir(dir)?
        }
        None => ReceiptTemplates::builtin()?,
    };
    let converter = SvgConverter::new(config.system_fonts, config.font_dir.as_deref())?;

    let state = AppState {
        db: db_pool,
        storage,
        receipts: ReceiptPipeline::new(templates, converter),
    };

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be non-zero"))?,
    );

    let app = build_router(state)
        .layer(cors_layer(&config)?)
        .layer(GovernorLayer::new(governor_config))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ));

    let addr = config.listen_addr;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn storage_operator(storage: &StorageConfig) -> anyhow::Result<Operator> {
    let op = match storage {
        StorageConfig::Fs { root } => {
            tracing::info!("Storing signature images under {}", root);
            Operator::new(Fs::default().root(root))?.finish()
        }
        StorageConfig::S3 { endpoint, bucket, region, access_key_id, secret_access_key } => {
            tracing::info!("Storing signature images in bucket {}", bucket);
            Operator::new(
                S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .region(region)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key),
            )?
            .finish()
        }
    };
    Ok(op)
}

// CORS configuration (no permissive mode)
fn cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", trimmed);
                    None
                }
            }
        })
        .collect();

    let origins = if origins.is_empty() {
        if config.is_production() {
            anyhow::bail!("ALLOWED_ORIGINS must contain at least one valid origin in production");
        }
        vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ]
    } else {
        origins
    };

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn db_pool_initializes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cerfa.sqlite3");
        let pool = db::init_pool(path.to_str().unwrap(), 2).await.expect("init pool");
        assert!(db::list_declarative_structures(&pool).await.unwrap().is_empty());
    }

    #[test]
    fn fs_storage_builds_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig::Fs { root: dir.path().display().to_string() };
        assert!(storage_operator(&storage).is_ok());
    }

    #[test]
    fn production_requires_origins() {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.env_mode = "production".into();
        assert!(cors_layer(&config).is_err());
        config.allowed_origins = Some("https://dons.example.org".into());
        assert!(cors_layer(&config).is_ok());
    }
}
