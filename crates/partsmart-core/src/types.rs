use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ── Resolution ──────────────────────────────────────────────────────────────

/// Where the resolved base URL came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The persisted selection named a registered environment
    Persisted,
    /// Nothing (or an unknown id) was persisted, registry default used
    Default,
    /// Manual fixed-network override bypassed the registry
    FixedNetwork,
    /// Hardcoded last-known-good URL
    Fallback,
}

/// Connection state currently in effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub base_url: String,
    /// Registry id, `None` for the fixed-network override and the fallback
    #[serde(default)]
    pub environment_id: Option<String>,
    pub is_local: bool,
    pub network_name: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_tested: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_working: bool,
    pub source: ResolutionSource,
}

impl ResolvedConfig {
    /// Record a reachability test. `last_tested` never moves backwards.
    pub fn record_test(&mut self, at: OffsetDateTime, is_working: bool) {
        self.last_tested = Some(match self.last_tested {
            Some(prev) if prev > at => prev,
            _ => at,
        });
        self.is_working = is_working;
    }
}

// ── Probing ─────────────────────────────────────────────────────────────────

/// Outcome of a connectivity check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_connected: bool,
    /// RFC 3339 timestamp of the check
    pub last_check: String,
    /// Wall-clock milliseconds from dispatch to response (or error)
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    /// Base URL of the backend that was checked, not the endpoint that answered
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn connected(backend: &str, response_time_ms: u64) -> Self {
        Self {
            is_connected: true,
            last_check: now_rfc3339(),
            response_time_ms,
            backend: backend.to_string(),
            error: None,
        }
    }

    pub fn failed(backend: &str, response_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            is_connected: false,
            last_check: now_rfc3339(),
            response_time_ms,
            backend: backend.to_string(),
            error: Some(error.into()),
        }
    }
}

/// Result of a single uncached endpoint probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCheck {
    pub is_connected: bool,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEntry {
    pub name: String,
    pub path: String,
    pub url: String,
    pub is_connected: bool,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Live sweep over every configured probe target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub started_at: String,
    /// One entry per target, in configured order
    pub tests: Vec<DiagnosticEntry>,
}

impl DiagnosticReport {
    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| t.is_connected).count()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.tests.len()
    }
}

// ── Domain API ──────────────────────────────────────────────────────────────

/// Uniform envelope returned by the marketplace REST endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            base_url: "http://127.0.0.1:5000/api".into(),
            environment_id: Some("local".into()),
            is_local: true,
            network_name: "Local".into(),
            last_tested: None,
            is_working: false,
            source: ResolutionSource::Persisted,
        }
    }

    #[test]
    fn record_test_never_moves_backwards() {
        let mut config = resolved();
        let later = OffsetDateTime::now_utc();
        let earlier = later - Duration::seconds(30);

        config.record_test(later, true);
        config.record_test(earlier, false);

        assert_eq!(config.last_tested, Some(later));
        assert!(!config.is_working);
    }

    #[test]
    fn connection_status_uses_wire_field_names() {
        let status = ConnectionStatus::connected("http://x/api/health", 42);
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["isConnected"], true);
        assert_eq!(value["responseTime"], 42);
        assert_eq!(value["backend"], "http://x/api/health");
        assert!(value.get("error").is_none());
        assert!(value["lastCheck"].as_str().unwrap().contains('T'));

        let failed = ConnectionStatus::failed("http://x/api", 7, "boom");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["error"], "boom");
    }

    #[test]
    fn resolved_config_json_mirror_parses_back() {
        let mut config = resolved();
        config.record_test(OffsetDateTime::now_utc(), true);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ResolvedConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.base_url, config.base_url);
        assert_eq!(parsed.source, ResolutionSource::Persisted);
        assert!(parsed.is_working);
        assert!(parsed.last_tested.is_some());
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let env: ApiEnvelope<Vec<u32>> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!env.success);
        assert!(env.data.is_none());
        assert!(env.message.is_none());
    }

    #[test]
    fn diagnostic_report_counts() {
        let entry = |ok| DiagnosticEntry {
            name: "health".into(),
            path: "/health".into(),
            url: "http://x/api/health".into(),
            is_connected: ok,
            response_time_ms: 1,
            status_code: Some(200),
            error: None,
        };
        let report = DiagnosticReport {
            base_url: "http://x/api".into(),
            started_at: now_rfc3339(),
            tests: vec![entry(true), entry(false), entry(true)],
        };
        assert_eq!(report.passed(), 2);
        assert!(!report.all_passed());
    }
}
