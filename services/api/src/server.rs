use crate::cli::ServeArgs;
use crate::infra::{AppState, StaticTokenIdentity, TracingNotifier};
use crate::routes::with_platform_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use dealdesk::config::AppConfig;
use dealdesk::error::AppError;
use dealdesk::telemetry;
use dealdesk::workflows::common::SystemClock;
use dealdesk::workflows::ports::MemoryDocumentStorage;
use dealdesk::workflows::{Context, Platform, Stores};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.no_scheduler {
        config.scheduler.enabled = false;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let platform = Platform::new(Context::new(
        Stores::in_memory(),
        Arc::new(SystemClock),
        Arc::new(TracingNotifier),
        Arc::new(MemoryDocumentStorage::default()),
    ));
    if config.auth.cron_secret.is_none() && config.auth.api_tokens.is_empty() {
        warn!("no API tokens or cron secret configured; every workflow route will answer 401");
    }
    let identity = Arc::new(StaticTokenIdentity::from_config(&config.auth));

    let app = with_platform_routes(&platform, identity)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    if config.scheduler.enabled {
        platform.scheduler.start();
    }
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, scheduler = config.scheduler.enabled, "deal desk ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    platform.scheduler.stop();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
