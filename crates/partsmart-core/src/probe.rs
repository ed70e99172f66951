use serde::{Deserialize, Serialize};

/// How a probe response is judged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessRule {
    /// 2xx, unless the body is a JSON object carrying `"success": false`.
    /// Non-JSON bodies count as success.
    #[default]
    Envelope,
    /// Any 2xx
    StatusOnly,
}

impl SuccessRule {
    /// `Ok(())` when the response counts as reachable, otherwise the failure message.
    pub fn evaluate(self, status: u16, body: &str) -> Result<(), String> {
        if !(200..300).contains(&status) {
            return Err(format!("HTTP {}", status));
        }
        match self {
            SuccessRule::StatusOnly => Ok(()),
            SuccessRule::Envelope => {
                let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
                    return Ok(());
                };
                match value.get("success").and_then(|v| v.as_bool()) {
                    Some(false) => {
                        let message = value
                            .get("message")
                            .and_then(|v| v.as_str())
                            .unwrap_or("server reported success: false");
                        Err(message.to_string())
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

/// One endpoint the prober knows how to hit.
///
/// The same ordered list drives both `check_connection` (only targets with
/// `candidate` set, first success wins) and `full_diagnostic` (every target).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub name: String,
    /// Path appended to the base URL; empty for the API root
    pub path: String,
    #[serde(default)]
    pub rule: SuccessRule,
    #[serde(default)]
    pub candidate: bool,
}

impl ProbeTarget {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            rule: SuccessRule::Envelope,
            candidate: false,
        }
    }

    pub fn candidate(mut self) -> Self {
        self.candidate = true;
        self
    }

    pub fn url(&self, base_url: &str) -> String {
        join_url(base_url, &self.path)
    }
}

/// Health, product listing, API root, auth, stores.
pub fn default_targets() -> Vec<ProbeTarget> {
    vec![
        ProbeTarget::new("health", "/health").candidate(),
        ProbeTarget::new("products", "/products").candidate(),
        ProbeTarget::new("root", "").candidate(),
        ProbeTarget::new("auth", "/auth"),
        ProbeTarget::new("stores", "/stores"),
    ]
}

/// Join a base URL and a path without doubling or dropping the separator.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_rule() {
        let rule = SuccessRule::Envelope;
        assert!(rule.evaluate(200, "<html>ok</html>").is_ok());
        assert!(rule.evaluate(200, "").is_ok());
        assert!(rule.evaluate(200, r#"{"success":true}"#).is_ok());
        assert!(rule.evaluate(200, r#"[1,2,3]"#).is_ok());
        assert_eq!(
            rule.evaluate(200, r#"{"success":false}"#),
            Err("server reported success: false".to_string())
        );
        assert_eq!(
            rule.evaluate(200, r#"{"success":false,"message":"db down"}"#),
            Err("db down".to_string())
        );
        assert_eq!(rule.evaluate(503, "{}"), Err("HTTP 503".to_string()));
    }

    #[test]
    fn status_only_rule_ignores_body() {
        assert!(SuccessRule::StatusOnly.evaluate(204, r#"{"success":false}"#).is_ok());
        assert!(SuccessRule::StatusOnly.evaluate(404, "").is_err());
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://h/api", "/health"), "http://h/api/health");
        assert_eq!(join_url("http://h/api/", "health"), "http://h/api/health");
        assert_eq!(join_url("http://h/api/", ""), "http://h/api");
    }

    #[test]
    fn default_candidates_are_health_products_root() {
        let names: Vec<_> = default_targets()
            .into_iter()
            .filter(|t| t.candidate)
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["health", "products", "root"]);
        assert_eq!(default_targets().len(), 5);
    }
}
