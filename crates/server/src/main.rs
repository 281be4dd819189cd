use std::net::SocketAddr;

use axum::http::{header, HeaderValue, Method};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use comunigov_server::{auth, config, db, health, openapi, storage, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,comunigov_server=debug")),
        )
        .init();

    config::load_feature_flags();
    let flags = config::feature_flags();

    if flags.telemetry {
        if let Err(e) = telemetry::init_telemetry() {
            tracing::error!(error = %e, "Telemetry disabled");
        }
    }
    health::record_start_time();

    let pool = db::create_pool();
    db::run_migrations(&pool).await;

    if flags.s3 {
        match storage::S3ObjectStore::from_env() {
            Ok(store) => store.ensure_bucket().await,
            Err(e) => tracing::error!(error = %e, "Attachment storage unavailable"),
        }
    }

    let max_body: usize = config::env_parse("MAX_UPLOAD_BYTES", config::DEFAULT_MAX_UPLOAD_BYTES);

    let mut router = openapi::api_router(pool);
    if flags.telemetry {
        router = router.layer(telemetry::OtelTraceLayer);
    }

    let router = router
        .layer(axum::extract::DefaultBodyLimit::max(max_body))
        .layer(axum::middleware::from_fn(auth::middleware::auth_middleware))
        .layer(cors_layer())
        .layer(tower_http::request_id::PropagateRequestIdLayer::x_request_id())
        .layer(tower_http::request_id::SetRequestIdLayer::x_request_id(
            tower_http::request_id::MakeRequestUuid,
        ));

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "ComuniGov API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Only `CORS_ALLOWED_ORIGIN` may call the API when it is set.
fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match std::env::var("CORS_ALLOWED_ORIGIN").ok().map(|o| o.parse::<HeaderValue>()) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(_)) => {
            tracing::warn!("CORS_ALLOWED_ORIGIN is not a valid header value, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
