mod api;
mod middleware;

use tracing_subscriber::EnvFilter;

use crate::api::{auth_rate_limit_state, build_app, uploads::UploadStore, AppState, HttpOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = wbnt_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = wbnt_db::PoolConfig::from_app_config(&config);
    let pool = wbnt_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = wbnt_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    seed_defaults(&pool, &config).await?;

    let uploads = UploadStore::new(config.uploads_dir.clone(), config.max_upload_bytes);
    uploads.ensure_dir().await?;

    let options = HttpOptions::from_app_config(&config);
    let app = build_app(
        AppState { pool, uploads },
        &options,
        auth_rate_limit_state(&config),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

/// Fill empty tables on first boot: homepage sections always, the catalog
/// only when its seed file is present.
async fn seed_defaults(
    pool: &sqlx::SqlitePool,
    config: &wbnt_core::AppConfig,
) -> anyhow::Result<()> {
    let sections = wbnt_db::seed_homepage_defaults(pool).await?;
    if sections > 0 {
        tracing::info!(sections, "seeded homepage content");
    }

    if !config.catalog_path.exists() {
        tracing::debug!(path = %config.catalog_path.display(), "no catalog seed file");
        return Ok(());
    }
    match wbnt_core::catalog::load_catalog(&config.catalog_path) {
        Ok(products) => {
            let inserted = wbnt_db::seed_catalog_if_empty(pool, &products).await?;
            if inserted > 0 {
                tracing::info!(inserted, "seeded product catalog");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %config.catalog_path.display(), "skipping catalog seed");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
