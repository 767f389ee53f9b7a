//! HTTP interface for Quizsmith.
//!
//! All routes live under `/api` and return JSON. Failures carry a
//! `{"detail": ...}` body with 400 for caller faults, 404 for unknown quizzes
//! and 500 for everything else.

mod error;
mod routes;
mod state;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

pub use error::{ApiError, Result};
pub use routes::GenerateRequest;
pub use state::AppState;

/// Bind the handlers to `state` under `/api`.
pub fn setup_route(app: AppState) -> Router {
    Router::new()
        .nest("/api", routes::setup_route())
        .with_state(app)
}

/// The full application: routes plus tracing and CORS middleware.
pub fn app(state: AppState, allowed_origins: &[String]) -> Router {
    add_middlewares(setup_route(state), allowed_origins)
}

/// Serve the application on `bind` until the process is stopped.
#[instrument(name = "http server", skip(state, allowed_origins))]
pub async fn serve(state: AppState, bind: &str, allowed_origins: &[String]) -> std::io::Result<()> {
    let router = app(state, allowed_origins);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await
}

fn add_middlewares(router: Router, allowed_origins: &[String]) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, latency_ms = latency.as_millis() as u64, "request failed");
    }

    router
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http().on_failure(log_failure))
}

/// `*` anywhere in the list allows any origin without credentials. An
/// explicit list allows credentials and mirrors the requested methods and
/// headers, since wildcards can't be combined with credentials.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .allow_origin(AllowOrigin::list(origins))
}
