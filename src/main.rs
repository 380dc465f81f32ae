use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use titanrace_backend::api::{self, AppState};
use titanrace_backend::config::AppConfig;
use titanrace_backend::database;
use titanrace_backend::database::discount_repository::DiscountRepository;
use titanrace_backend::database::order_repository::OrderRepository;
use titanrace_backend::logging::init_tracing;
use titanrace_backend::processor::MercadoPagoClient;
use titanrace_backend::services::{
    CheckoutService, LogConfirmationSender, OrderStateService, ReconcilerService,
};

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🚀 Starting Titan Race registration backend"
    );

    info!("📊 Initializing database connection pool...");
    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e)
        })?;
    info!("✅ Database connection pool initialized");

    if config.processor.webhook_secret.is_none() {
        warn!("MP_WEBHOOK_SECRET not set; webhook signatures will NOT be verified");
    }

    let orders = Arc::new(OrderRepository::new(db_pool.clone()));
    let discounts = Arc::new(DiscountRepository::new(db_pool.clone()));
    let processor = Arc::new(MercadoPagoClient::new(&config.processor).map_err(|e| {
        error!("Failed to initialize processor client: {}", e);
        anyhow::anyhow!(e)
    })?);

    let order_state = Arc::new(OrderStateService::new(
        orders.clone(),
        discounts.clone(),
        Arc::new(LogConfirmationSender::new()),
    ));
    let checkout = Arc::new(CheckoutService::new(
        orders.clone(),
        discounts.clone(),
        processor.clone(),
        config.checkout.clone(),
        config.processor.clone(),
    ));
    let reconciler = Arc::new(ReconcilerService::new(
        orders.clone(),
        processor.clone(),
        order_state.clone(),
    ));

    let state = AppState {
        checkout,
        order_state,
        reconciler,
        webhook_secret: config.processor.webhook_secret.clone(),
        db_pool,
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}
