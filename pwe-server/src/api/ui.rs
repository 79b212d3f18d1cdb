//! Static pages
//!
//! `/admin` and `/admin/menu` map to fixed files in the admin directory.
//! Every other path is looked up in the SPA build output, and unknown
//! paths get `index.html` so client-side routes survive a reload.

use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

pub const ADMIN_PAGE: &str = "admin.html";
pub const MENU_ADMIN_PAGE: &str = "menu-admin.html";

/// GET /admin and GET /admin/menu
///
/// A missing file answers 404.
pub fn admin_routes(admin_dir: &Path) -> Router {
    Router::new()
        .route_service("/admin", ServeFile::new(admin_dir.join(ADMIN_PAGE)))
        .route_service("/admin/menu", ServeFile::new(admin_dir.join(MENU_ADMIN_PAGE)))
}

/// SPA files with `index.html` fallback
pub fn spa_service(dist_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dist_dir).fallback(ServeFile::new(dist_dir.join("index.html")))
}
