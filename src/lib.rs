//! streamgate - conditional-access backend for an IPTV platform.
//!
//! Token/HWID stream authentication with HMAC-SHA256 request signatures,
//! subscription management with tier-priority resolution, and periodic
//! control-word rotation, backed by an embedded SQLite store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use http::{Method, header};
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod audit;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub mod crypto {
    pub mod signature;
}

pub mod models {
    pub mod key;
    pub mod package;
    pub mod payment;
    pub mod subscription;
    pub mod user;
}

pub mod repositories {
    pub mod key;
    pub mod payment;
    pub mod subscription;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod keys;
    pub mod rotation;
    pub mod subscription;
}

pub mod handlers {
    pub mod admin;
    pub mod auth;
    pub mod stream;
    pub mod token;
}

pub mod middleware_layer {
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
}

use config::Config;
use state::AppState;

/// Per-request deadline so a slow store call cannot stall other callers.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Assembles the full API router around the given state.
///
/// Each endpoint group carries its own per-source rate-limit ceiling;
/// the coarse global governor layer is applied in [`run`] because it needs
/// peer-address information from the listener.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-signature"),
        ]);

    let authenticate_routes = Router::new()
        .route("/api/authenticate", post(handlers::auth::authenticate))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_authenticate,
        ))
        .with_state(state.clone());

    let stream_routes = Router::new()
        .route("/api/stream_info", get(handlers::stream::stream_info))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_stream_info,
        ))
        .with_state(state.clone());

    let token_routes = Router::new()
        .route("/api/token/create", post(handlers::token::create_token))
        .route("/api/token/revoke", post(handlers::token::revoke_token))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_admin,
        ))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route("/api/admin/users/edit", post(handlers::admin::edit_user))
        .route("/api/admin/subscribe", post(handlers::admin::subscribe))
        .route("/api/admin/cancel", post(handlers::admin::cancel))
        .route("/api/admin/rotate", post(handlers::admin::rotate))
        .route("/api/admin/keys", get(handlers::admin::recent_keys))
        .route("/api/admin/payments", get(handlers::admin::payments))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_admin,
        ))
        .with_state(state);

    Router::new()
        .merge(authenticate_routes)
        .merge(stream_routes)
        .merge(token_routes)
        .merge(admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(cors)
}

/// Entry point: loads configuration, starts the rotation scheduler, and
/// serves the API until a shutdown signal arrives.
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    let rotation_state = state.clone();
    tokio::spawn(async move {
        // Only an unrecoverable store failure ends the scheduler.
        if let Err(e) = services::rotation::run(rotation_state).await {
            tracing::error!("❌ Rotation scheduler terminated: {}", e);
            std::process::exit(1);
        }
    });
    tracing::info!(
        "✅ Background key rotation started (every {} seconds)",
        config.rotation_interval_secs
    );

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(100)
            .use_headers()
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid governor configuration"))?,
    );

    let app = app(state).layer(tower_governor::GovernorLayer::new(governor_conf));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("🚀 CAS API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("👋 Shutdown signal received, draining in-flight requests");
}
