use mimalloc::MiMalloc;
use safeheaven::config::{CONFIG, Config};
use safeheaven::db::{HeavenStorage, connect};
use safeheaven::service::limiter::PRUNE_INTERVAL;
use safeheaven::service::mailer;
use safeheaven::{HeavenState, heaven_router};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg: &Config = &CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        frontend_url = %cfg.basic.frontend_url,
        proxy = %cfg.hazard.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        smtp = cfg.smtp.is_some(),
        lenient = cfg.hazard.lenient,
        loglevel = %cfg.basic.loglevel
    );

    let storage = HeavenStorage::new(connect(&cfg.basic.database_url).await?);
    storage.init_schema().await?;
    let mailer = mailer::from_config(cfg.smtp.as_ref())?;

    let state = HeavenState::new(cfg.clone(), storage, mailer)?;
    state.limits.spawn_pruner(PRUNE_INTERVAL);
    let app = heaven_router(state);

    let addr = cfg.basic.listen_addr.as_str();
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
