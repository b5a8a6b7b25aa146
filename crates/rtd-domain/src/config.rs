use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub drift: DriftConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn pipeline tuning — the load-bearing bounds from spec.md §5.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Outbound event queue capacity (`Q` in spec.md).
    #[serde(default = "d_outbound_capacity")]
    pub outbound_queue_capacity: usize,
    /// Sentence queue capacity between the LLM producer and the TTS+Avatar
    /// consumer in split-stage mode (`SQ` in spec.md).
    #[serde(default = "d_sentence_capacity")]
    pub sentence_queue_capacity: usize,
    /// Minimum trimmed-buffer length before a sentence-ending punctuation
    /// mark is allowed to flush a segment.
    #[serde(default = "d_min_sentence_len")]
    pub min_sentence_len: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: d_outbound_capacity(),
            sentence_queue_capacity: d_sentence_capacity(),
            min_sentence_len: d_min_sentence_len(),
        }
    }
}

fn d_outbound_capacity() -> usize {
    64
}
fn d_sentence_capacity() -> usize {
    2
}
fn d_min_sentence_len() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Ring buffer window size for the drift tracker.
    #[serde(default = "d_drift_window")]
    pub window: usize,
    /// Budget in ms used by `within_budget` when no explicit budget is
    /// passed.
    #[serde(default = "d_drift_budget_ms")]
    pub default_budget_ms: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            window: d_drift_window(),
            default_budget_ms: d_drift_budget_ms(),
        }
    }
}

fn d_drift_window() -> usize {
    10
}
fn d_drift_budget_ms() -> f64 {
    80.0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults for anything
    /// absent. Environment variables `RTD_HOST`/`RTD_PORT` override the
    /// file when set.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let mut cfg: Config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| {
                crate::error::Error::InvalidControl(format!("config parse error: {e}"))
            })?
        } else {
            Config::default()
        };
        if let Ok(host) = std::env::var("RTD_HOST") {
            cfg.server.host = host;
        }
        if let Ok(port) = std::env::var("RTD_PORT") {
            if let Ok(port) = port.parse() {
                cfg.server.port = port;
            }
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.turn.outbound_queue_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "turn.outbound_queue_capacity".into(),
                message: "must be greater than 0 — an unbounded queue defeats back-pressure"
                    .into(),
            });
        }
        if self.turn.sentence_queue_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "turn.sentence_queue_capacity".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.drift.window == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "drift.window".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got {errors:?}");
    }

    #[test]
    fn zero_outbound_capacity_is_error() {
        let mut cfg = Config::default();
        cfg.turn.outbound_queue_capacity = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "turn.outbound_queue_capacity"
                && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn zero_sentence_capacity_is_error() {
        let mut cfg = Config::default();
        cfg.turn.sentence_queue_capacity = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "turn.sentence_queue_capacity"));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "server.cors.allowed_origins")
            .expect("expected CORS wildcard warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn defaults_match_spec_bounds() {
        let cfg = Config::default();
        assert_eq!(cfg.turn.outbound_queue_capacity, 64);
        assert_eq!(cfg.turn.sentence_queue_capacity, 2);
        assert_eq!(cfg.turn.min_sentence_len, 10);
        assert_eq!(cfg.drift.window, 10);
        assert_eq!(cfg.drift.default_budget_ms, 80.0);
    }
}
