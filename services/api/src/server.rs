use crate::cli::ServeArgs;
use crate::infra::{in_memory_services, AppState, StaticPanelDirectory};
use crate::routes::with_funding_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use edufund::config::AppConfig;
use edufund::error::AppError;
use edufund::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let panel = if args.panel.is_empty() {
        StaticPanelDirectory::default()
    } else {
        StaticPanelDirectory::new(args.panel)
    };
    let (services, _outbox) = in_memory_services(&config, panel);

    let app = with_funding_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        currency = %config.funding.currency,
        payment_timeout_ms = config.payments.timeout.as_millis() as u64,
        "education funding service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
