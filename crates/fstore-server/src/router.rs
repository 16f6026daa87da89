use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};
use tower_http::trace::TraceLayer;

use crate::config::{CorsConfig, ServerConfig};
use crate::handler::{self, AppState};

/// Build the axum router with every store endpoint.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(handler::root))
        .route(
            "/store",
            get(handler::get_file)
                .post(handler::add_file)
                .put(handler::update_file)
                .delete(handler::remove_file),
        )
        .route("/store/check/file", get(handler::check_file))
        .route("/store/check/sha", get(handler::check_sha))
        .route("/store/list", get(handler::list_files))
        .route("/store/count", get(handler::word_count))
        .route("/store/frequency", get(handler::word_frequency))
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors))
        .with_state(state)
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == "*")
}

/// CORS policy from configuration.
///
/// Browsers reject `*` on credentialed requests, so with credentials enabled
/// a wildcard origin, method or header list mirrors the request instead.
/// Wildcard expose headers have no mirrored form and are dropped in that case.
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let credentials = cors.allow_credentials;
    let mut layer = CorsLayer::new()
        .allow_credentials(credentials)
        .max_age(Duration::from_secs(cors.max_age));

    layer = match (is_wildcard(&cors.allow_origins), credentials) {
        (true, true) => layer.allow_origin(AllowOrigin::mirror_request()),
        (true, false) => layer.allow_origin(Any),
        (false, _) => layer.allow_origin(AllowOrigin::list(
            cors.allow_origins.iter().filter_map(|o| HeaderValue::from_str(o.trim()).ok()),
        )),
    };

    layer = match (is_wildcard(&cors.allow_methods), credentials) {
        (true, true) => layer.allow_methods(AllowMethods::mirror_request()),
        (true, false) => layer.allow_methods(Any),
        (false, _) => layer.allow_methods(AllowMethods::list(
            cors.allow_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok()),
        )),
    };

    layer = match (is_wildcard(&cors.allow_headers), credentials) {
        (true, true) => layer.allow_headers(AllowHeaders::mirror_request()),
        (true, false) => layer.allow_headers(Any),
        (false, _) => layer.allow_headers(AllowHeaders::list(parse_header_names(&cors.allow_headers))),
    };

    match (is_wildcard(&cors.expose_headers), credentials) {
        (true, true) => layer,
        (true, false) => layer.expose_headers(Any),
        (false, _) => layer.expose_headers(ExposeHeaders::list(parse_header_names(&cors.expose_headers))),
    }
}

fn parse_header_names(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .filter_map(|n| HeaderName::from_bytes(n.trim().as_bytes()).ok())
        .collect()
}
