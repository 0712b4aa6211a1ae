//! Session State Controller
//!
//! Owns the single [`SessionState`] and sequences it against the analyzer.
//! Only one scan may be underway at a time; the guard lives in the state
//! machine, not in the page.

use chrono::Utc;
use sentinel_common::{EventBus, SentinelEvent, SessionPhase};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::analyzer::{AnalysisError, OrdnanceAnalyzer};
use crate::models::{
    ImageData, SessionError, SessionSnapshot, SessionState, SessionTransition,
};

/// Captured image cleared for analysis
///
/// Obtained from [`CaptureGuard::submit`]; pass it to
/// [`SessionController::run`] to perform the analysis.
#[must_use = "the session stays ANALYZING until the pending analysis is run"]
#[derive(Debug)]
pub struct PendingAnalysis {
    image: ImageData,
}

/// Open CAPTURING window returned by [`SessionController::begin_capture`]
///
/// Consumed by [`CaptureGuard::submit`] or [`CaptureGuard::fail`]. Dropping
/// it unconsumed, e.g. when the upload request is abandoned mid-body, moves
/// the session to ERROR so it never stays CAPTURING.
#[must_use = "dropping the guard fails the capture"]
pub struct CaptureGuard {
    controller: Arc<SessionController>,
    armed: bool,
}

impl CaptureGuard {
    /// CAPTURING → ANALYZING with the fully read image
    pub async fn submit(
        mut self,
        image: ImageData,
    ) -> Result<(SessionSnapshot, PendingAnalysis), SessionError> {
        let outcome = self.controller.submit(image).await;
        self.armed = false;
        outcome
    }

    /// CAPTURING → ERROR when the upload could not be read
    pub async fn fail(mut self, message: &str) -> Result<SessionSnapshot, SessionError> {
        let outcome = self.controller.capture_failed(message).await;
        self.armed = false;
        outcome
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Upload abandoned during capture");

        match self.controller.state.try_write() {
            Ok(mut state) => self.controller.abandon_capture(&mut state),
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let controller = self.controller.clone();
                    handle.spawn(async move {
                        let mut state = controller.state.write().await;
                        controller.abandon_capture(&mut state);
                    });
                }
                Err(_) => warn!("No runtime to settle abandoned capture"),
            },
        }
    }
}

/// Drives the scan lifecycle for one session
pub struct SessionController {
    state: RwLock<SessionState>,
    analyzer: Arc<dyn OrdnanceAnalyzer>,
    event_bus: EventBus,
}

impl SessionController {
    /// New controller in IDLE
    pub fn new(analyzer: Arc<dyn OrdnanceAnalyzer>, event_bus: EventBus) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            analyzer,
            event_bus,
        }
    }

    pub fn provider(&self) -> &str {
        self.analyzer.provider()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase()
    }

    /// Image held for display, if any
    pub async fn image(&self) -> Option<ImageData> {
        self.state.read().await.image().cloned()
    }

    /// IDLE → CAPTURING, before the upload is read
    pub async fn begin_capture(self: &Arc<Self>) -> Result<CaptureGuard, SessionError> {
        let mut state = self.state.write().await;
        let transition = state
            .begin_capture()
            .inspect_err(|e| warn!(error = %e, "Scan rejected"))?;
        self.publish(&transition);
        Ok(CaptureGuard {
            controller: self.clone(),
            armed: true,
        })
    }

    async fn submit(
        &self,
        image: ImageData,
    ) -> Result<(SessionSnapshot, PendingAnalysis), SessionError> {
        let mut state = self.state.write().await;
        let transition = state.submit(image.clone())?;
        self.publish(&transition);
        info!(
            media_type = image.media_type(),
            size_bytes = image.len(),
            "Image captured"
        );
        Ok((state.snapshot(), PendingAnalysis { image }))
    }

    async fn capture_failed(&self, message: &str) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.write().await;
        let transition = state.capture_failed(message)?;
        self.publish(&transition);
        self.publish_failure(state.error().unwrap_or_default());
        Ok(state.snapshot())
    }

    /// Await the analyzer and settle ANALYZING into RESULT or ERROR
    ///
    /// The lock is not held across the analyzer call.
    pub async fn run(&self, pending: PendingAnalysis) -> SessionSnapshot {
        let outcome = self.analyzer.analyze(&pending.image).await;

        let mut state = self.state.write().await;
        let settled = match outcome {
            Ok(analysis) => {
                let event = SentinelEvent::AnalysisCompleted {
                    is_explosive: analysis.is_explosive,
                    threat_level: analysis.threat_level,
                    confidence: analysis.confidence,
                    timestamp: Utc::now(),
                };
                info!(verdict = analysis.verdict_label(), "Scan settled");
                state.complete(analysis).map(|t| (t, Some(event)))
            }
            Err(e) => {
                warn!(error = %e, "Scan failed");
                state.fail(&e.to_string()).map(|t| (t, None))
            }
        };

        match settled {
            Ok((transition, completed)) => {
                self.publish(&transition);
                match completed {
                    Some(event) => self.event_bus.emit_lossy(event),
                    None => self.publish_failure(state.error().unwrap_or_default()),
                }
            }
            // Only reachable if the session left ANALYZING behind our back
            Err(e) => warn!(error = %e, "Discarding analysis outcome"),
        }

        state.snapshot()
    }

    /// IDLE → CAPTURING → ANALYZING → RESULT | ERROR for bytes already in hand
    pub async fn scan(self: &Arc<Self>, image: ImageData) -> Result<SessionSnapshot, SessionError> {
        let capture = self.begin_capture().await?;
        let (_, pending) = capture.submit(image).await?;
        Ok(self.run(pending).await)
    }

    /// RESULT | ERROR → IDLE; no-op when IDLE; refused mid-scan
    pub async fn reset(&self) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.write().await;
        match state.reset()? {
            Some(transition) => {
                info!("Session reset");
                self.publish(&transition);
            }
            None => debug!("Reset requested while idle"),
        }
        Ok(state.snapshot())
    }

    fn abandon_capture(&self, state: &mut SessionState) {
        let message = AnalysisError::Encoding("upload abandoned before completion".to_string())
            .to_string();
        match state.capture_failed(&message) {
            Ok(transition) => {
                self.publish(&transition);
                self.publish_failure(&message);
            }
            Err(e) => debug!(error = %e, "Abandoned capture already settled"),
        }
    }

    fn publish(&self, transition: &SessionTransition) {
        debug!(
            old_phase = %transition.old_phase,
            new_phase = %transition.new_phase,
            "Session phase changed"
        );
        self.event_bus.emit_lossy(SentinelEvent::PhaseChanged {
            old_phase: transition.old_phase,
            new_phase: transition.new_phase,
            timestamp: transition.transitioned_at,
        });
    }

    fn publish_failure(&self, message: &str) {
        self.event_bus.emit_lossy(SentinelEvent::AnalysisFailed {
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}
