//! Analysis provider seam
//!
//! The session controller only sees [`OrdnanceAnalyzer`]; any provider that
//! honours the structured-output contract can stand behind it.

use async_trait::async_trait;
use sentinel_common::OrdnanceAnalysis;
use thiserror::Error;

use crate::models::{EmptyImage, ImageData};

/// Fixed message for responses that do not match the analysis schema
pub const PARSE_ERROR_MESSAGE: &str = "Failed to parse analysis data";

/// Analysis failures
///
/// Display text is what the operator sees in the error phase.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Image could not be read or encoded
    #[error("Failed to read image data: {0}")]
    Encoding(String),

    /// Inference service unreachable, non-success status, or unusable envelope
    #[error("{0}")]
    Service(String),

    /// Service answered, but not with a valid analysis
    #[error("Failed to parse analysis data")]
    Parse,

    /// Client constructed without a credential
    #[error("Inference service API key is empty")]
    MissingCredential,
}

impl From<EmptyImage> for AnalysisError {
    fn from(err: EmptyImage) -> Self {
        AnalysisError::Encoding(err.to_string())
    }
}

/// Turns a photograph into a validated hazard assessment
#[async_trait]
pub trait OrdnanceAnalyzer: Send + Sync {
    /// Issue exactly one analysis request for `image`
    ///
    /// Never retries. Returns either a fully validated analysis or an error.
    async fn analyze(&self, image: &ImageData) -> Result<OrdnanceAnalysis, AnalysisError>;

    /// Provider name for logs and health output
    fn provider(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AnalysisError::Parse.to_string(), PARSE_ERROR_MESSAGE);
        assert_eq!(
            AnalysisError::Service("error sending request".to_string()).to_string(),
            "error sending request"
        );
        assert_eq!(
            AnalysisError::from(EmptyImage).to_string(),
            "Failed to read image data: image payload is empty"
        );
    }
}
