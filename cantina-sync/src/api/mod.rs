//! HTTP API handlers for cantina-sync
//!
//! Read endpoints expose whatever the pipeline has enriched so far; admin
//! endpoints are guarded by the shared admin key.

pub mod admin;
pub mod health;
pub mod menu;
pub mod surveillance;

pub use admin::admin_routes;
pub use health::health_routes;
pub use menu::menu_routes;
pub use surveillance::surveillance_routes;
