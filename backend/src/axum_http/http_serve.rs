use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::infra::{
    counters::{CounterBackend, in_memory::InMemoryCounterStore, redis_store::RedisCounterStore},
    db::postgres::postgres_connection::PgPoolSquad,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

const COUNTER_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let counters = Arc::new(counter_backend(&config)?);
    if let CounterBackend::InMemory(store) = counters.as_ref() {
        spawn_counter_purge(store.clone());
    }
    info!(backend = counters.name(), "Counter store is ready");

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/generate",
            routers::generate::routes(
                Arc::clone(&config),
                Arc::clone(&db_pool),
                Arc::clone(&counters),
            )?,
        )
        .nest(
            "/api/v1",
            routers::account::routes(Arc::clone(&config), Arc::clone(&db_pool)),
        )
        .nest(
            "/api/v1/webhooks",
            routers::webhooks::routes(Arc::clone(&config), Arc::clone(&db_pool)),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn counter_backend(config: &DotEnvyConfig) -> Result<CounterBackend> {
    match config.counters.redis_url.as_deref() {
        Some(url) => Ok(CounterBackend::Redis(RedisCounterStore::new(
            url,
            Duration::from_millis(config.counters.redis_timeout_ms),
        )?)),
        None => Ok(CounterBackend::InMemory(InMemoryCounterStore::new())),
    }
}

fn spawn_counter_purge(store: InMemoryCounterStore) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(COUNTER_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            store.purge_expired();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
