//! HTTP API handlers for emma-dash

pub mod dashboard;
pub mod health;
pub mod reports;

pub use dashboard::{get_fusion, get_revenue, get_sources, get_status, post_refresh};
pub use health::health_routes;
pub use reports::get_report_file;
