//! Test Helper Utilities
//!
//! Shared utilities for testing sentinel-scan: a scripted analyzer for the
//! session controller and a local stand-in for the Gemini REST API.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use sentinel_common::{OrdnanceAnalysis, SessionPhase, ThreatLevel};
use sentinel_scan::models::ImageData;
use sentinel_scan::services::{AnalysisError, OrdnanceAnalyzer, SessionController};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

pub fn test_image() -> ImageData {
    ImageData::new(JPEG_BYTES.to_vec(), Some("image/jpeg")).unwrap()
}

/// Result for a photo of an empty room
pub fn empty_room() -> OrdnanceAnalysis {
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

/// Result for a photo of a grenade
pub fn grenade() -> OrdnanceAnalysis {
    OrdnanceAnalysis {
        is_explosive: true,
        ordnance_type: "M67 Grenade".to_string(),
        confidence: 0.88,
        threat_level: ThreatLevel::High,
        description: "Fragmentation grenade, pin intact.".to_string(),
        safety_protocols: vec!["Evacuate 50m radius".to_string(), "Contact EOD".to_string()],
        components_identified: vec!["Fuze".to_string(), "Body casing".to_string()],
        dimensions_estimated: "64mm diameter".to_string(),
    }
}

/// What the stub analyzer answers
#[derive(Debug, Clone)]
pub enum StubOutcome {
    Analysis(OrdnanceAnalysis),
    ServiceError(String),
    ParseError,
}

/// Scripted analyzer
///
/// When gated, each call waits for [`StubAnalyzer::release`] before answering.
pub struct StubAnalyzer {
    outcome: Mutex<StubOutcome>,
    gate: Option<Notify>,
    calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn new(outcome: StubOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(outcome: StubOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            gate: Some(Notify::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_outcome(&self, outcome: StubOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrdnanceAnalyzer for StubAnalyzer {
    async fn analyze(&self, _image: &ImageData) -> Result<OrdnanceAnalysis, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            StubOutcome::Analysis(analysis) => Ok(analysis),
            StubOutcome::ServiceError(msg) => Err(AnalysisError::Service(msg)),
            StubOutcome::ParseError => Err(AnalysisError::Parse),
        }
    }

    fn provider(&self) -> &str {
        "stub"
    }
}

/// Poll until the controller reaches `phase` (2 second limit)
pub async fn wait_for_phase(controller: &SessionController, phase: SessionPhase) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while controller.phase().await != phase {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out waiting for phase {}; session is {}",
            phase,
            controller.phase().await
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Request received by the mock provider
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Last path segment, e.g. `gemini-test:generateContent`
    pub call: String,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Local stand-in for the Gemini REST API
pub struct MockProvider {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockProvider {
    /// Serve `body` with `status` for every generateContent call
    pub async fn start(status: u16, body: String) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status: StatusCode::from_u16(status).unwrap(),
            body,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/v1beta/models/:call", post(generate_content))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/v1beta", addr),
            requests,
        }
    }

    /// Reply with a successful envelope whose candidate text is `text`
    pub async fn answering(text: &str) -> Self {
        Self::start(200, gemini_envelope(text)).await
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn generate_content(
    State(state): State<MockState>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let api_key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .requests
        .lock()
        .unwrap()
        .push(RecordedRequest { call, api_key, body });

    (state.status, state.body.clone())
}

/// Successful generateContent envelope carrying `text`
pub fn gemini_envelope(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 1290,
            "candidatesTokenCount": 85,
            "totalTokenCount": 1375
        }
    })
    .to_string()
}
