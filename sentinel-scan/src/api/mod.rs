//! HTTP API handlers for sentinel-scan

pub mod health;
pub mod scan;
pub mod sse;
pub mod ui;

pub use health::health_routes;
pub use scan::scan_routes;
pub use sse::event_stream;
pub use ui::ui_routes;
