//! HTTP serving layer: routing, configuration, and shared state.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use self::config::ServiceConfig;
use self::state::AppState;

/// Builds the service router.
///
/// The configured read and write deadlines bound a request together: axum
/// has no separate socket-read phase hook, so their sum is applied as one
/// request deadline. A value of zero on both sides disables the layer.
pub fn router(state: AppState, config: &ServiceConfig) -> Router {
    let mut router = Router::new()
        .route("/alloc", get(handlers::alloc))
        .route("/health", get(handlers::health));

    let deadline = config
        .http_read_timeout
        .saturating_add(config.http_write_timeout);
    if deadline > 0 {
        router = router.layer(TimeoutLayer::new(Duration::from_millis(deadline)));
    }

    router.with_state(state)
}
