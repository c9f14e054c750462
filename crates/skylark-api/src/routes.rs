//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, body limits
//! and the rate limiter.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use skylark_core::config::SkylarkConfig;
use skylark_core::SkylarkError;

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS middleware: allow localhost origins for a local client, on the
    // configured port plus port+1 for a dev server.
    let port = state.config.general.api_port;
    let dev_port = port.saturating_add(1);
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            format!("http://127.0.0.1:{}", port)
                .parse::<HeaderValue>()
                .unwrap(),
            format!("http://localhost:{}", port)
                .parse::<HeaderValue>()
                .unwrap(),
            format!("http://127.0.0.1:{}", dev_port)
                .parse::<HeaderValue>()
                .unwrap(),
            format!("http://localhost:{}", dev_port)
                .parse::<HeaderValue>()
                .unwrap(),
        ]))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Health stays reachable regardless of rate limiting, so probes keep
    // working while the API is saturated.
    let public_routes = Router::new().route("/health", get(handlers::health));

    // Rate limiter: 100 requests per second.
    let limiter = RateLimiter::new(100);

    let rate_limited_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::clear_session),
        )
        .route(
            "/sessions/{id}/steps/{step}",
            put(handlers::update_step).layer(DefaultBodyLimit::max(64 * 1024)),
        )
        .route(
            "/sessions/{id}/booking/confirm",
            post(handlers::confirm_booking),
        )
        .route("/sessions/{id}/bookings", get(handlers::list_bookings))
        .route(
            "/sessions/{id}/bookings/{reference}/cancel",
            post(handlers::cancel_booking),
        )
        .route("/breakers/{service}/reset", post(handlers::reset_breaker))
        .layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter));

    public_routes
        .merge(rate_limited_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Binds to 127.0.0.1 (localhost only) on the port from config.
pub async fn start_server(config: &SkylarkConfig, state: AppState) -> Result<(), SkylarkError> {
    let addr = format!("127.0.0.1:{}", config.general.api_port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
