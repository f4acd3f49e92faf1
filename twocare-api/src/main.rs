//! # TwoCare API Server
//!
//! Co-parenting backend: families, invites, babies, care activities and
//! photos behind a versioned JSON API.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/twocare \
//! JWT_SECRET=... JWT_REFRESH_SECRET=... \
//! cargo run -p twocare-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use twocare_api::app::{build_router, AppState};
use twocare_shared::{
    clock::SystemClock,
    config::Config,
    db::{migrations::run_migrations, pool::create_pool, PgStore},
    services::ServiceContext,
    storage::{DisabledStorage, ObjectStorage, SupabaseStorage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("TwoCare API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::from_env().context("failed to load configuration")?);

    let pool = create_pool(config.database.clone())
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let storage: Arc<dyn ObjectStorage> = match SupabaseStorage::from_config(&config.storage)? {
        Some(supabase) => Arc::new(supabase),
        None => {
            tracing::warn!("Supabase storage not configured; avatar and photo uploads are disabled");
            Arc::new(DisabledStorage)
        }
    };

    let services = ServiceContext::new(
        Arc::new(PgStore::new(pool.clone())),
        storage,
        Arc::new(SystemClock),
        config.clone(),
    );
    let app = build_router(AppState::new(services));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = shutdown_signal().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("Shutdown signal received, closing database pool");
    pool.close().await;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "twocare_api=debug,twocare_shared=debug,tower_http=debug".into());
    let log_json = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);

    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
