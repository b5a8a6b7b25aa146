pub mod cli;
pub mod http;
pub mod state;
pub mod ws;

pub use state::AppState;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the CORS layer from `server.cors.allowed_origins`, mirroring
/// `gateway/src/main.rs`'s `build_cors_layer`. A literal `"*"` entry is
/// fully permissive; an origin ending `:*` is a wildcard-port prefix
/// (`http://localhost:*` matches any `http://localhost:<port>`, with
/// the port validated as digits-only to block a suffix bypass like
/// `http://localhost:3000.evil.com`); everything else is matched
/// exactly.
pub fn build_cors_layer(cors: &rtd_domain::config::CorsConfig) -> CorsLayer {
    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();
    for origin in &cors.allowed_origins {
        if let Some(prefix) = origin.strip_suffix('*') {
            wildcard_prefixes.push(prefix.to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Assemble the full router: the 5 endpoints from spec.md's transport
/// concretization, plus a tracing layer matching the connection-loop's
/// request-scoped logging.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/sessions", post(http::create_session))
        .route("/v1/sessions/:id/stream", get(ws::stream_session))
        .route("/v1/health", get(http::health))
        .route("/v1/capabilities", get(http::capabilities))
        .route("/v1/personas", get(http::personas))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
