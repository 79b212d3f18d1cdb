//! HTTP routes

pub mod health;
pub mod ui;

pub use health::{health_check, health_routes, HealthResponse};
pub use ui::{admin_routes, spa_service, ADMIN_PAGE, MENU_ADMIN_PAGE};
