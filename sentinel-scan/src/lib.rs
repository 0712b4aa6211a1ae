//! sentinel-scan library interface
//!
//! Exposes the analysis client, session controller and HTTP router for the
//! binary and for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sentinel_common::EventBus;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{OrdnanceAnalyzer, SessionController};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The one scan session served by this process
    pub controller: Arc<SessionController>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(analyzer: Arc<dyn OrdnanceAnalyzer>, event_bus: EventBus) -> Self {
        Self {
            controller: Arc::new(SessionController::new(analyzer, event_bus.clone())),
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        // UI routes (HTML page + script)
        .merge(api::ui_routes())
        // API routes
        .merge(api::scan_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
