use crate::client::resolver::ConfigResolver;
use crate::client::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::probe::join_url;
use crate::types::ApiEnvelope;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// The server answered `success: false`
    #[error("{0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Client for the marketplace REST endpoints (`/quotations`, `/cart/...`, ...).
///
/// Requests go to the resolver's active base URL and carry the stored bearer
/// token when there is one.
#[derive(Clone)]
pub struct ApiClient {
    resolver: Arc<ConfigResolver>,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(
        resolver: Arc<ConfigResolver>,
        transport: Arc<dyn HttpTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            transport,
            timeout,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = join_url(&self.resolver.base_url().await, path);
        let token = self.resolver.selection().auth_token();
        let request = HttpRequest::get(url, self.timeout).bearer(token.as_deref());
        decode(self.transport.send(request).await?)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = join_url(&self.resolver.base_url().await, path);
        let token = self.resolver.selection().auth_token();
        let body = serde_json::to_string(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
        let request = HttpRequest::post_json(url, body, self.timeout).bearer(token.as_deref());
        decode(self.transport.send(request).await?)
    }
}

fn decode<T: DeserializeOwned>(resp: HttpResponse) -> Result<T, ApiError> {
    if !resp.is_success() {
        let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&resp.body)
            .ok()
            .and_then(|env| env.message)
            .unwrap_or_else(|| resp.body.chars().take(200).collect());
        return Err(ApiError::Status {
            status: resp.status,
            message,
        });
    }

    let envelope: ApiEnvelope<T> =
        serde_json::from_str(&resp.body).map_err(|e| ApiError::Malformed(e.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "request failed".to_string()),
        ));
    }
    match envelope.data {
        Some(data) => Ok(data),
        // `data` is optional; `()` and `Option<_>` targets read an absent one as null
        None => serde_json::from_value(serde_json::Value::Null)
            .map_err(|_| ApiError::Malformed("missing data".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeTransport;
    use crate::client::resolver::ResolverSettings;
    use crate::client::transport::Method;
    use crate::environment::{BackendEnvironment, EnvironmentRegistry};
    use crate::selection::SelectionStore;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    const BASE: &str = "https://api.example.com/api";

    #[derive(Debug, Deserialize, PartialEq)]
    struct Quotation {
        id: String,
        total: u32,
    }

    fn setup() -> (Arc<FakeTransport>, SelectionStore, ApiClient) {
        let registry = Arc::new(
            EnvironmentRegistry::new(vec![BackendEnvironment::new("prod", "Production", BASE)], "prod")
                .unwrap(),
        );
        let transport = Arc::new(FakeTransport::new());
        let selection = SelectionStore::new(Arc::new(MemoryStore::new()));
        let resolver = Arc::new(ConfigResolver::new(
            registry,
            selection.clone(),
            transport.clone(),
            ResolverSettings::default(),
        ));
        let client = ApiClient::new(resolver, transport.clone(), Duration::from_secs(5));
        (transport, selection, client)
    }

    fn auth_header(request: &HttpRequest) -> Option<String> {
        request
            .headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .map(|(_, value)| value.clone())
    }

    #[tokio::test]
    async fn get_unwraps_envelope_data_with_bearer() {
        let (transport, selection, client) = setup();
        selection.set_auth_token("tok-1");
        transport.respond(
            &format!("{}/quotations", BASE),
            200,
            r#"{"success":true,"data":[{"id":"q1","total":120}]}"#,
        );

        let quotes: Vec<Quotation> = client.get("/quotations").await.unwrap();
        assert_eq!(
            quotes,
            vec![Quotation {
                id: "q1".into(),
                total: 120
            }]
        );
        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(auth_header(&requests[0]).as_deref(), Some("Bearer tok-1"));
    }

    #[tokio::test]
    async fn anonymous_requests_carry_no_authorization() {
        let (transport, _selection, client) = setup();
        transport.respond(&format!("{}/stores", BASE), 200, r#"{"success":true,"data":[]}"#);

        let stores: Vec<serde_json::Value> = client.get("stores").await.unwrap();
        assert!(stores.is_empty());
        assert_eq!(auth_header(&transport.requests()[0]), None);
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let (transport, _selection, client) = setup();
        transport.respond(
            &format!("{}/cart/items", BASE),
            200,
            r#"{"success":true,"data":{"id":"c1","total":3}}"#,
        );

        let created: Quotation = client
            .post("/cart/items", &serde_json::json!({ "partId": "p-9", "qty": 3 }))
            .await
            .unwrap();
        assert_eq!(created.id, "c1");
        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body.as_deref(), Some(r#"{"partId":"p-9","qty":3}"#));
    }

    #[tokio::test]
    async fn envelope_failure_surfaces_server_message() {
        let (transport, _selection, client) = setup();
        transport.respond(
            &format!("{}/quotations", BASE),
            200,
            r#"{"success":false,"message":"quotation expired"}"#,
        );
        let err = client.get::<Vec<Quotation>>("/quotations").await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "quotation expired"));
    }

    #[tokio::test]
    async fn http_error_prefers_envelope_message() {
        let (transport, _selection, client) = setup();
        transport.respond(
            &format!("{}/admin/settings", BASE),
            403,
            r#"{"success":false,"message":"admin only"}"#,
        );
        transport.respond(&format!("{}/seller/orders", BASE), 502, "Bad Gateway");

        let err = client.get::<serde_json::Value>("/admin/settings").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 403: admin only");
        let err = client.get::<serde_json::Value>("/seller/orders").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }

    #[tokio::test]
    async fn envelope_without_data_suits_unit_and_option_targets() {
        let (transport, _selection, client) = setup();
        transport.respond(
            &format!("{}/cart/clear", BASE),
            200,
            r#"{"success":true,"message":"cart cleared"}"#,
        );

        let cleared: Option<serde_json::Value> = client
            .post("/cart/clear", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(cleared, None);
        let () = client.post("/cart/clear", &serde_json::json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_and_transport_errors() {
        let (transport, _selection, client) = setup();
        transport.respond(&format!("{}/delivery/jobs", BASE), 200, "<html>");
        transport.respond(&format!("{}/delivery/empty", BASE), 200, r#"{"success":true}"#);

        assert!(matches!(
            client.get::<serde_json::Value>("/delivery/jobs").await,
            Err(ApiError::Malformed(_))
        ));
        assert!(matches!(
            client.get::<Vec<u32>>("/delivery/empty").await,
            Err(ApiError::Malformed(_))
        ));
        assert!(matches!(
            client.get::<serde_json::Value>("/unrouted").await,
            Err(ApiError::Transport(TransportError::Connect(_)))
        ));
    }
}
