//! Server-Sent Events for session phase updates

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// GET /events - SSE event stream for the scan session
///
/// Sends the current snapshot on connect, then streams:
/// - PhaseChanged
/// - AnalysisCompleted
/// - AnalysisFailed
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to session events");

    // Subscribe before taking the snapshot so no transition falls in between
    let mut rx = state.event_bus.subscribe();
    let initial = state.controller.snapshot().await;

    let stream = async_stream::stream! {
        match serde_json::to_string(&initial) {
            Ok(json) => yield Ok(Event::default().event("SessionSnapshot").data(json)),
            Err(e) => warn!("SSE: Failed to serialize initial snapshot: {}", e),
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type().to_string();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: Broadcasting event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(json));
                        }
                        Err(e) => warn!("SSE: Failed to serialize event {}: {}", event_type, e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: Client lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
