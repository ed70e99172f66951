//! Scripted transport for tests.

use crate::client::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone, Debug)]
enum Outcome {
    Respond(HttpResponse),
    Fail(TransportError),
}

#[derive(Clone, Debug)]
struct Route {
    outcome: Outcome,
    delay: Option<Duration>,
}

/// Transport answering from a per-URL script and recording every request.
///
/// URLs without a script fail with a connect error.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.insert(
            url,
            Outcome::Respond(HttpResponse {
                status,
                body: body.to_string(),
            }),
            None,
        );
    }

    pub fn respond_after(&self, url: &str, delay: Duration, status: u16, body: &str) {
        self.insert(
            url,
            Outcome::Respond(HttpResponse {
                status,
                body: body.to_string(),
            }),
            Some(delay),
        );
    }

    pub fn fail(&self, url: &str, error: TransportError) {
        self.insert(url, Outcome::Fail(error), None);
    }

    fn insert(&self, url: &str, outcome: Outcome, delay: Option<Duration>) {
        self.routes
            .lock()
            .insert(url.to_string(), Route { outcome, delay });
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.calls.lock().push(request);
        let route = self.routes.lock().get(&url).cloned();
        let Some(route) = route else {
            return Err(TransportError::Connect(format!("no route to {}", url)));
        };
        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }
        match route.outcome {
            Outcome::Respond(resp) => Ok(resp),
            Outcome::Fail(e) => Err(e),
        }
    }
}
