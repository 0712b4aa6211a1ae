//! Event types for the Sentinel event system

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::ThreatLevel;

/// Scan session phase
///
/// `Capturing` covers the window in which the uploaded image is being read,
/// before it is handed to the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionPhase {
    /// Waiting for an image
    Idle,
    /// Image upload being read
    Capturing,
    /// Analysis request in flight
    Analyzing,
    /// Analysis available
    Result,
    /// Scan failed
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "IDLE",
            SessionPhase::Capturing => "CAPTURING",
            SessionPhase::Analyzing => "ANALYZING",
            SessionPhase::Result => "RESULT",
            SessionPhase::Error => "ERROR",
        }
    }

    /// True while a scan is underway and can neither be restarted nor reset
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionPhase::Capturing | SessionPhase::Analyzing)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentinel event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SentinelEvent {
    /// Session moved between phases
    PhaseChanged {
        old_phase: SessionPhase,
        new_phase: SessionPhase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Analysis returned a valid result
    AnalysisCompleted {
        is_explosive: bool,
        threat_level: ThreatLevel,
        confidence: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scan ended in the error phase
    AnalysisFailed {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SentinelEvent {
    /// Event name used for SSE `event:` lines
    pub fn event_type(&self) -> &str {
        match self {
            SentinelEvent::PhaseChanged { .. } => "PhaseChanged",
            SentinelEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            SentinelEvent::AnalysisFailed { .. } => "AnalysisFailed",
        }
    }
}

/// Broadcast bus for session events
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SentinelEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// let _rx = event_bus.subscribe();
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SentinelEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SentinelEvent) {
        let _ = self.tx.send(event);
    }
}
