//! pwe-server library - static hosting for the Philly Wings Express site
//!
//! Serves the prebuilt single-page application, the two admin pages, and a
//! health endpoint. Menu data never passes through here.

use axum::Router;
use pwe_common::config::ServerConfig;
use tower_http::trace::TraceLayer;

pub mod api;

/// Build application router
pub fn build_router(config: &ServerConfig) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::admin_routes(&config.admin_dir))
        .fallback_service(api::spa_service(&config.dist_dir))
        .layer(TraceLayer::new_for_http())
}
