use serde::{Deserialize, Serialize};

/// Static descriptor a generator returns to advertise what it can do.
/// Informational to the core — the orchestrator never branches on these
/// fields, only reports them via `/v1/capabilities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorCapabilities {
    pub supports_streaming: bool,
    pub supports_emotion: bool,
    pub supports_identity: bool,
    pub max_text_length: usize,
    pub supported_emotions: Vec<String>,
}

impl Default for GeneratorCapabilities {
    fn default() -> Self {
        Self {
            supports_streaming: true,
            supports_emotion: false,
            supports_identity: false,
            max_text_length: 5_000,
            supported_emotions: Vec::new(),
        }
    }
}

/// Result of a generator's health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: f64,
    pub detail: Option<String>,
}

impl HealthStatus {
    pub fn ok(latency_ms: f64) -> Self {
        Self {
            healthy: true,
            latency_ms,
            detail: None,
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            latency_ms: 0.0,
            detail: Some(detail.into()),
        }
    }
}

/// The three generators' health reports, as returned by `GET /v1/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub llm: HealthStatus,
    pub tts: HealthStatus,
    pub avatar: HealthStatus,
}

/// The three generators' capability descriptors, as returned by
/// `GET /v1/capabilities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCapabilities {
    pub llm: GeneratorCapabilities,
    pub tts: GeneratorCapabilities,
    pub avatar: GeneratorCapabilities,
}
