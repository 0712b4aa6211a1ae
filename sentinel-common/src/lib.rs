//! # Sentinel Common Library
//!
//! Shared code for the Sentinel ordnance scanner including:
//! - Ordnance analysis result model and display helpers
//! - Session phase and event types (SentinelEvent enum)
//! - Configuration loading and credential resolution
//! - Common error type

pub mod analysis;
pub mod config;
pub mod error;
pub mod events;

pub use analysis::{InvalidAnalysis, OrdnanceAnalysis, ThreatLevel};
pub use error::{Error, Result};
pub use events::{EventBus, SentinelEvent, SessionPhase};
