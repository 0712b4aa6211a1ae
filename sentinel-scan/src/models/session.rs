//! Scan session state machine
//!
//! IDLE → CAPTURING → ANALYZING → RESULT | ERROR, and back to IDLE on reset.
//!
//! Each phase carries exactly the data that is meaningful in it, so a RESULT
//! never holds an error message and an ERROR never holds an analysis.

use chrono::{DateTime, Utc};
use sentinel_common::{OrdnanceAnalysis, SessionPhase};
use serde::Serialize;
use thiserror::Error;

use crate::models::image::{ImageData, ImageSummary};

/// Shown when a failure carries no message of its own
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred during analysis.";

/// Rejected session transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A scan is being captured or analyzed
    #[error("Scan already in progress (session is {0})")]
    Busy(SessionPhase),

    /// Transition not allowed from the current phase
    #[error("Cannot {action} while session is {from}")]
    InvalidTransition {
        from: SessionPhase,
        action: &'static str,
    },
}

/// Session state (in-memory, one per process)
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Capturing,
    Analyzing {
        image: ImageData,
    },
    Result {
        image: ImageData,
        analysis: OrdnanceAnalysis,
    },
    Error {
        /// Absent when the upload itself could not be read
        image: Option<ImageData>,
        message: String,
    },
}

/// Record of one phase change
#[derive(Debug, Clone, Serialize)]
pub struct SessionTransition {
    pub old_phase: SessionPhase,
    pub new_phase: SessionPhase,
    pub transitioned_at: DateTime<Utc>,
}

/// Read-only view handed to the rendering layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub image: Option<ImageSummary>,
    pub result: Option<OrdnanceAnalysis>,
    pub error: Option<String>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Capturing => SessionPhase::Capturing,
            SessionState::Analyzing { .. } => SessionPhase::Analyzing,
            SessionState::Result { .. } => SessionPhase::Result,
            SessionState::Error { .. } => SessionPhase::Error,
        }
    }

    pub fn image(&self) -> Option<&ImageData> {
        match self {
            SessionState::Analyzing { image } | SessionState::Result { image, .. } => Some(image),
            SessionState::Error { image, .. } => image.as_ref(),
            SessionState::Idle | SessionState::Capturing => None,
        }
    }

    pub fn result(&self) -> Option<&OrdnanceAnalysis> {
        match self {
            SessionState::Result { analysis, .. } => Some(analysis),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SessionState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            image: self.image().map(ImageData::summary),
            result: self.result().cloned(),
            error: self.error().map(str::to_string),
        }
    }

    /// IDLE → CAPTURING
    pub fn begin_capture(&mut self) -> Result<SessionTransition, SessionError> {
        match self.phase() {
            SessionPhase::Idle => Ok(self.transition_to(SessionState::Capturing)),
            phase if phase.is_busy() => Err(SessionError::Busy(phase)),
            from => Err(SessionError::InvalidTransition {
                from,
                action: "start a scan",
            }),
        }
    }

    /// CAPTURING → ANALYZING, holding the captured image
    pub fn submit(&mut self, image: ImageData) -> Result<SessionTransition, SessionError> {
        self.require(SessionPhase::Capturing, "submit an image")?;
        Ok(self.transition_to(SessionState::Analyzing { image }))
    }

    /// CAPTURING → ERROR when the upload could not be read
    pub fn capture_failed(&mut self, message: &str) -> Result<SessionTransition, SessionError> {
        self.require(SessionPhase::Capturing, "record a capture failure")?;
        Ok(self.transition_to(SessionState::Error {
            image: None,
            message: error_message(message),
        }))
    }

    /// ANALYZING → RESULT
    pub fn complete(&mut self, analysis: OrdnanceAnalysis) -> Result<SessionTransition, SessionError> {
        let image = self.take_analyzing_image("complete an analysis")?;
        Ok(self.transition_to(SessionState::Result { image, analysis }))
    }

    /// ANALYZING → ERROR
    pub fn fail(&mut self, message: &str) -> Result<SessionTransition, SessionError> {
        let image = self.take_analyzing_image("fail an analysis")?;
        Ok(self.transition_to(SessionState::Error {
            image: Some(image),
            message: error_message(message),
        }))
    }

    /// RESULT | ERROR → IDLE, clearing image, result and error
    ///
    /// Returns `Ok(None)` when already idle. Refused mid-scan since an
    /// in-flight analysis cannot be cancelled.
    pub fn reset(&mut self) -> Result<Option<SessionTransition>, SessionError> {
        match self.phase() {
            SessionPhase::Idle => Ok(None),
            phase if phase.is_busy() => Err(SessionError::Busy(phase)),
            _ => Ok(Some(self.transition_to(SessionState::Idle))),
        }
    }

    fn require(&self, expected: SessionPhase, action: &'static str) -> Result<(), SessionError> {
        let from = self.phase();
        if from == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition { from, action })
        }
    }

    fn take_analyzing_image(&mut self, action: &'static str) -> Result<ImageData, SessionError> {
        match std::mem::take(self) {
            SessionState::Analyzing { image } => Ok(image),
            other => {
                let from = other.phase();
                *self = other;
                Err(SessionError::InvalidTransition { from, action })
            }
        }
    }

    fn transition_to(&mut self, next: SessionState) -> SessionTransition {
        let old_phase = self.phase();
        *self = next;
        SessionTransition {
            old_phase,
            new_phase: self.phase(),
            transitioned_at: Utc::now(),
        }
    }
}

fn error_message(message: &str) -> String {
    if message.trim().is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::ThreatLevel;

    fn image() -> ImageData {
        ImageData::new(vec![0xFF, 0xD8, 0xFF, 0xE0], Some("image/jpeg")).unwrap()
    }

    fn analysis() -> OrdnanceAnalysis {
        OrdnanceAnalysis {
            is_explosive: false,
            ordnance_type: "None".to_string(),
            confidence: 0.95,
            threat_level: ThreatLevel::Low,
            description: "No ordnance detected.".to_string(),
            safety_protocols: vec![],
            components_identified: vec![],
            dimensions_estimated: String::new(),
        }
    }

    fn assert_exclusive(state: &SessionState) {
        let snapshot = state.snapshot();
        match snapshot.phase {
            SessionPhase::Idle | SessionPhase::Capturing => {
                assert!(snapshot.image.is_none());
                assert!(snapshot.result.is_none());
                assert!(snapshot.error.is_none());
            }
            SessionPhase::Analyzing => {
                assert!(snapshot.image.is_some());
                assert!(snapshot.result.is_none());
                assert!(snapshot.error.is_none());
            }
            SessionPhase::Result => {
                assert!(snapshot.result.is_some());
                assert!(snapshot.error.is_none());
            }
            SessionPhase::Error => {
                assert!(snapshot.result.is_none());
                assert!(snapshot.error.is_some());
            }
        }
    }

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let state = SessionState::default();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert_exclusive(&state);
    }

    #[test]
    fn test_successful_scan_path() {
        let mut state = SessionState::default();

        let t = state.begin_capture().unwrap();
        assert_eq!((t.old_phase, t.new_phase), (SessionPhase::Idle, SessionPhase::Capturing));
        assert_exclusive(&state);

        let t = state.submit(image()).unwrap();
        assert_eq!(t.new_phase, SessionPhase::Analyzing);
        assert_exclusive(&state);

        let t = state.complete(analysis()).unwrap();
        assert_eq!(t.new_phase, SessionPhase::Result);
        assert_exclusive(&state);
        assert_eq!(state.result().unwrap().verdict_label(), "Target: CLEAR");
        // Image retained for display alongside the result
        assert!(state.image().is_some());
    }

    #[test]
    fn test_failed_analysis_keeps_image() {
        let mut state = SessionState::default();
        state.begin_capture().unwrap();
        state.submit(image()).unwrap();

        state.fail("connection refused").unwrap();
        assert_eq!(state.phase(), SessionPhase::Error);
        assert_eq!(state.error(), Some("connection refused"));
        assert!(state.image().is_some());
        assert_exclusive(&state);
    }

    #[test]
    fn test_empty_failure_message_uses_generic_text() {
        let mut state = SessionState::default();
        state.begin_capture().unwrap();
        state.submit(image()).unwrap();

        state.fail("  ").unwrap();
        assert_eq!(state.error(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[test]
    fn test_capture_failure_has_no_image() {
        let mut state = SessionState::default();
        state.begin_capture().unwrap();

        state.capture_failed("Failed to read image data: image payload is empty").unwrap();
        assert_eq!(state.phase(), SessionPhase::Error);
        assert!(state.image().is_none());
        assert_exclusive(&state);
    }

    #[test]
    fn test_second_scan_rejected_while_busy() {
        let mut state = SessionState::default();
        state.begin_capture().unwrap();
        assert_eq!(
            state.begin_capture().unwrap_err(),
            SessionError::Busy(SessionPhase::Capturing)
        );

        state.submit(image()).unwrap();
        assert_eq!(
            state.begin_capture().unwrap_err(),
            SessionError::Busy(SessionPhase::Analyzing)
        );
    }

    #[test]
    fn test_scan_from_result_requires_reset() {
        let mut state = SessionState::default();
        state.begin_capture().unwrap();
        state.submit(image()).unwrap();
        state.complete(analysis()).unwrap();

        assert!(matches!(
            state.begin_capture(),
            Err(SessionError::InvalidTransition { from: SessionPhase::Result, .. })
        ));
    }

    #[test]
    fn test_reset_clears_everything() {
        for fail in [false, true] {
            let mut state = SessionState::default();
            state.begin_capture().unwrap();
            state.submit(image()).unwrap();
            if fail {
                state.fail("boom").unwrap();
            } else {
                state.complete(analysis()).unwrap();
            }

            let t = state.reset().unwrap().unwrap();
            assert_eq!(t.new_phase, SessionPhase::Idle);
            assert!(state.image().is_none());
            assert!(state.result().is_none());
            assert!(state.error().is_none());

            // Idempotent
            assert!(state.reset().unwrap().is_none());
            assert_eq!(state.phase(), SessionPhase::Idle);
        }
    }

    #[test]
    fn test_reset_refused_mid_scan() {
        let mut state = SessionState::default();
        state.begin_capture().unwrap();
        state.submit(image()).unwrap();

        assert_eq!(
            state.reset().unwrap_err(),
            SessionError::Busy(SessionPhase::Analyzing)
        );
        assert_eq!(state.phase(), SessionPhase::Analyzing);
    }

    #[test]
    fn test_out_of_order_transitions_rejected() {
        let mut state = SessionState::default();
        assert!(state.submit(image()).is_err());
        assert!(state.complete(analysis()).is_err());
        assert!(state.fail("x").is_err());
        assert!(state.capture_failed("x").is_err());
        assert_eq!(state.phase(), SessionPhase::Idle);
    }
}
