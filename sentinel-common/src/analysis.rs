//! Ordnance analysis result model
//!
//! The structured hazard assessment returned by the inference service.
//! Values coming off the wire are only accepted through
//! [`OrdnanceAnalysis::from_json`], which rejects anything that violates the
//! threat-level or confidence constraints. There is no partial result.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ordinal hazard classification assigned by the inference service
///
/// Only these four literals are valid, with exactly this casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl ThreatLevel {
    /// All levels in ascending order
    pub const ALL: [ThreatLevel; 4] = [
        ThreatLevel::Low,
        ThreatLevel::Medium,
        ThreatLevel::High,
        ThreatLevel::Extreme,
    ];

    /// Wire literal for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "Low",
            ThreatLevel::Medium => "Medium",
            ThreatLevel::High => "High",
            ThreatLevel::Extreme => "Extreme",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a response body was rejected as an analysis
#[derive(Debug, Error)]
pub enum InvalidAnalysis {
    /// Body is not JSON, is missing a required field, has a wrong field type,
    /// or carries a threat level outside the four literals
    #[error("malformed analysis JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Confidence is NaN, infinite, or outside [0, 1]
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Structured hazard assessment for one photograph
///
/// Field names follow the camelCase contract of the inference service schema.
/// `componentsIdentified` and `dimensionsEstimated` are optional on the wire and
/// default to empty when absent. List order is the server's display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdnanceAnalysis {
    /// Primary classification outcome
    pub is_explosive: bool,

    /// Category or model label ("None" when not explosive)
    #[serde(rename = "type")]
    pub ordnance_type: String,

    /// Probability in [0, 1]
    pub confidence: f64,

    /// Required even for negative classifications
    pub threat_level: ThreatLevel,

    /// Free-text rationale
    pub description: String,

    /// Ordered safety steps (empty when not explosive)
    pub safety_protocols: Vec<String>,

    /// Ordered visible components (empty when not explosive)
    #[serde(default)]
    pub components_identified: Vec<String>,

    /// Free-text size estimate
    #[serde(default)]
    pub dimensions_estimated: String,
}

impl OrdnanceAnalysis {
    /// Parse and validate a response body
    ///
    /// Fails on malformed JSON, a missing required field, a wrong field type,
    /// an unknown threat level, or a confidence outside [0, 1].
    pub fn from_json(text: &str) -> Result<Self, InvalidAnalysis> {
        let analysis: OrdnanceAnalysis = serde_json::from_str(text.trim())?;
        analysis.validate()?;
        Ok(analysis)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), InvalidAnalysis> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(InvalidAnalysis::ConfidenceOutOfRange(self.confidence));
        }
        Ok(())
    }

    /// Headline verdict shown to the operator
    pub fn verdict_label(&self) -> &'static str {
        if self.is_explosive {
            "Target: POSITIVE"
        } else {
            "Target: CLEAR"
        }
    }

    /// Threat badge text, only shown for positive targets
    pub fn threat_badge(&self) -> Option<&'static str> {
        self.is_explosive.then_some(self.threat_level.as_str())
    }
}
