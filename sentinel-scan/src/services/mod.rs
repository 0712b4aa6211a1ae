//! Analysis and session services

pub mod analyzer;
pub mod gemini_client;
pub mod session_controller;

pub use analyzer::{AnalysisError, OrdnanceAnalyzer, PARSE_ERROR_MESSAGE};
pub use gemini_client::{GeminiClient, GeminiConfig};
pub use session_controller::{CaptureGuard, PendingAnalysis, SessionController};
