//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with probe, stats and tool routes
//! - Wire up middleware (request id, tracing, timeout, security)
//! - Bind to a listener and serve until shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::health::HealthAggregator;
use crate::http::{handlers, request};
use crate::security::{
    auth_middleware, origin_middleware, rate_limit_middleware, with_security_headers, OriginPolicy,
    RateLimiter, TokenAuth,
};
use crate::tools::{ApiKeyStore, Tools};
use crate::upstream::ConnectionManager;

/// Largest accepted tool request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub health: Arc<HealthAggregator<ConnectionManager>>,
    pub tools: Arc<Tools>,
}

impl AppState {
    pub fn new(config: &ServerConfig, manager: Arc<ConnectionManager>) -> Self {
        Self {
            health: Arc::new(HealthAggregator::new(manager.clone(), config)),
            tools: Arc::new(Tools::new(
                manager.clone(),
                ApiKeyStore::new(config.upstream.api_key.clone()),
            )),
            manager,
        }
    }
}

/// HTTP front end of the server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, manager: Arc<ConnectionManager>, auth: TokenAuth, origins: OriginPolicy) -> Self {
        if auth.is_required() && auth.token_count() == 0 {
            tracing::warn!("Authentication is required but no tokens are configured; tool endpoints will reject every request");
        }

        let state = AppState::new(config, manager);
        let router = Self::build_router(config, state, auth, origins);
        Self { router }
    }

    fn build_router(config: &ServerConfig, state: AppState, auth: TokenAuth, origins: OriginPolicy) -> Router {
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        // Probes stay public.
        let public = Router::new()
            .route("/health", get(handlers::liveness))
            .route("/ready", get(handlers::readiness))
            .route("/health/detailed", get(handlers::detailed))
            .route("/stats", get(handlers::stats));

        let tools = Router::new()
            .route("/tools", get(handlers::list_tools))
            .route("/tools/{name}", post(handlers::call_tool))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .layer(middleware::from_fn_with_state(Arc::new(auth), auth_middleware))
            .layer(middleware::from_fn_with_state(Arc::new(origins), origin_middleware))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

        let router = Router::new()
            .merge(public)
            .merge(tools)
            .with_state(state)
            .layer(middleware::from_fn(request::record_request_metrics))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.server.request_timeout_secs),
            ))
            .layer(TraceLayer::new_for_http().make_span_with(request::make_span))
            .layer(request::propagate_request_id_layer())
            .layer(request::set_request_id_layer());

        with_security_headers(router)
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
