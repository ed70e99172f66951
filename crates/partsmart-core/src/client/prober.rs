use crate::client::resolver::ConfigResolver;
use crate::client::transport::{HttpRequest, HttpTransport, TransportError};
use crate::probe::{ProbeTarget, default_targets};
use crate::types::{ConnectionStatus, DiagnosticEntry, DiagnosticReport, EndpointCheck, now_rfc3339};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Default freshness window for a successful check.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(60);
/// Default bound on a single HTTP probe.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
/// Shortest accepted monitoring period.
pub const MIN_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct ProbeSettings {
    /// Ordered targets shared by `check_connection` and `full_diagnostic`
    pub targets: Vec<ProbeTarget>,
    pub cache_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, ConnectionStatus>>;

#[derive(Default)]
struct ProberState {
    last: Option<ConnectionStatus>,
    /// Set only after a successful probe
    cached_at: Option<Instant>,
    in_flight: Option<InFlight>,
    /// Generation handed to the most recently started probe
    started_generation: u64,
    /// Results with a generation at or below this are stale
    applied_generation: u64,
}

struct Inner {
    resolver: Arc<ConfigResolver>,
    transport: Arc<dyn HttpTransport>,
    settings: ProbeSettings,
    state: Mutex<ProberState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    monitor: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor.get_mut().take() {
            handle.abort();
        }
    }
}

/// Answers "is the active backend reachable right now".
///
/// Cheap to clone; clones share cache, listeners and the monitor.
#[derive(Clone)]
pub struct ConnectivityProber {
    inner: Arc<Inner>,
}

impl ConnectivityProber {
    pub fn new(
        resolver: Arc<ConfigResolver>,
        transport: Arc<dyn HttpTransport>,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                transport,
                settings,
                state: Mutex::new(ProberState::default()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                monitor: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.inner.settings
    }

    /// Check the active backend.
    ///
    /// A success younger than the cache timeout is returned as-is without
    /// touching the network. Otherwise candidate targets are tried in order
    /// until one succeeds. Callers arriving while a probe runs await that
    /// same probe.
    pub async fn check_connection(&self) -> ConnectionStatus {
        let probe = {
            let mut state = self.inner.state.lock();
            if let (Some(at), Some(status)) = (state.cached_at, &state.last) {
                if at.elapsed() < self.inner.settings.cache_timeout {
                    log::trace!("Connection status served from cache");
                    return status.clone();
                }
            }
            let existing = state.in_flight.clone();
            match existing {
                Some(in_flight) => in_flight,
                None => {
                    state.started_generation += 1;
                    let generation = state.started_generation;
                    let probe = self.inner.clone().spawn_probe(generation);
                    state.in_flight = Some(probe.clone());
                    probe
                }
            }
        };
        probe.await
    }

    /// Probe one path of the active backend. Never cached.
    pub async fn check_specific_endpoint(&self, path: &str) -> EndpointCheck {
        let base_url = self.inner.resolver.base_url().await;
        let target = ProbeTarget::new(path, path);
        probe_target(
            self.inner.transport.as_ref(),
            &base_url,
            &target,
            self.inner.settings.request_timeout,
        )
        .await
    }

    /// Live sweep over every configured target. Neither reads nor writes the cache.
    pub async fn full_diagnostic(&self) -> DiagnosticReport {
        let base_url = self.inner.resolver.base_url().await;
        let started_at = now_rfc3339();
        let transport = self.inner.transport.as_ref();
        let timeout = self.inner.settings.request_timeout;

        let checks = futures::future::join_all(
            self.inner
                .settings
                .targets
                .iter()
                .map(|target| probe_target(transport, &base_url, target, timeout)),
        )
        .await;

        let tests = self
            .inner
            .settings
            .targets
            .iter()
            .zip(checks)
            .map(|(target, check)| DiagnosticEntry {
                name: target.name.clone(),
                path: target.path.clone(),
                url: target.url(&base_url),
                is_connected: check.is_connected,
                response_time_ms: check.response_time_ms,
                status_code: check.status_code,
                error: check.error,
            })
            .collect::<Vec<_>>();

        log::info!(
            "Diagnostic for {}: {}/{} endpoints reachable",
            base_url,
            tests.iter().filter(|t| t.is_connected).count(),
            tests.len()
        );
        DiagnosticReport {
            base_url,
            started_at,
            tests,
        }
    }

    /// Most recent applied status, without probing.
    pub fn last_status(&self) -> Option<ConnectionStatus> {
        self.inner.state.lock().last.clone()
    }

    /// Forget the cached success and mark any running probe as stale.
    ///
    /// Called after the active environment changes so the next check is live.
    pub fn invalidate_cache(&self) {
        let mut state = self.inner.state.lock();
        state.cached_at = None;
        state.in_flight = None;
        state.applied_generation = state.started_generation;
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Re-check every `interval`, starting immediately. Replaces a running monitor.
    ///
    /// Must be called from within a tokio runtime. Intervals shorter than
    /// [`MIN_MONITOR_INTERVAL`] are raised to it.
    pub fn start_monitoring(&self, interval: Duration) {
        if interval < MIN_MONITOR_INTERVAL {
            log::warn!(
                "Monitoring interval {:?} is too short, using {:?}",
                interval,
                MIN_MONITOR_INTERVAL
            );
        }
        let interval = interval.max(MIN_MONITOR_INTERVAL);
        let mut monitor = self.inner.monitor.lock();
        if let Some(previous) = monitor.take() {
            previous.abort();
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                ConnectivityProber { inner }.check_connection().await;
            }
        }));
        log::info!("Connection monitoring started ({:?} interval)", interval);
    }

    /// Cancel the timer. A probe already running still completes and notifies.
    pub fn stop_monitoring(&self) {
        if let Some(handle) = self.inner.monitor.lock().take() {
            handle.abort();
            log::info!("Connection monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Inner {
    /// Run the probe on its own task so cancelling a waiter never cancels the probe.
    fn spawn_probe(self: Arc<Self>, generation: u64) -> InFlight {
        let task = tokio::spawn(async move {
            let status = self.probe_candidates().await;
            self.apply(generation, &status);
            status
        });
        async move {
            match task.await {
                Ok(status) => status,
                Err(e) => ConnectionStatus::failed("", 0, format!("probe task failed: {}", e)),
            }
        }
        .boxed()
        .shared()
    }

    async fn probe_candidates(&self) -> ConnectionStatus {
        let base_url = self.resolver.base_url().await;
        let mut last_failure: Option<EndpointCheck> = None;

        for target in self.settings.targets.iter().filter(|t| t.candidate) {
            let check = probe_target(
                self.transport.as_ref(),
                &base_url,
                target,
                self.settings.request_timeout,
            )
            .await;
            if check.is_connected {
                log::debug!(
                    "Backend {} reachable via `{}` in {}ms",
                    base_url,
                    target.name,
                    check.response_time_ms
                );
                return ConnectionStatus::connected(&base_url, check.response_time_ms);
            }
            last_failure = Some(check);
        }

        match last_failure {
            Some(check) => {
                let error = check.error.unwrap_or_else(|| "unreachable".to_string());
                log::warn!("Backend {} unreachable: {}", base_url, error);
                ConnectionStatus::failed(&base_url, check.response_time_ms, error)
            }
            None => ConnectionStatus::failed(&base_url, 0, "no probe targets configured"),
        }
    }

    fn apply(&self, generation: u64, status: &ConnectionStatus) {
        {
            let mut state = self.state.lock();
            if state.started_generation == generation {
                state.in_flight = None;
            }
            if generation <= state.applied_generation {
                log::debug!("Discarding stale probe result (generation {})", generation);
                return;
            }
            state.applied_generation = generation;
            state.last = Some(status.clone());
            state.cached_at = status.is_connected.then(Instant::now);
        }
        self.notify(status);
    }

    fn notify(&self, status: &ConnectionStatus) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(status))).is_err() {
                log::warn!("Connection status listener panicked");
            }
        }
    }
}

/// One GET against `target` on `base_url`, judged by the target's rule.
///
/// Latency is wall-clock time from dispatch to response or error. Transport
/// errors, timeouts and rejected responses all come back as a failed check.
pub(crate) async fn probe_target(
    transport: &dyn HttpTransport,
    base_url: &str,
    target: &ProbeTarget,
    timeout: Duration,
) -> EndpointCheck {
    let url = target.url(base_url);
    let started = Instant::now();
    let result = tokio::time::timeout(timeout, transport.send(HttpRequest::get(&url, timeout))).await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    let outcome = match result {
        Err(_) => Err((None, TransportError::Timeout(timeout).to_string())),
        Ok(Err(e)) => Err((None, e.to_string())),
        Ok(Ok(resp)) => match target.rule.evaluate(resp.status, &resp.body) {
            Ok(()) => Ok(resp.status),
            Err(message) => Err((Some(resp.status), message)),
        },
    };

    match outcome {
        Ok(status) => EndpointCheck {
            is_connected: true,
            response_time_ms,
            status_code: Some(status),
            error: None,
        },
        Err((status_code, error)) => {
            log::debug!("Probe {} failed: {}", url, error);
            EndpointCheck {
                is_connected: false,
                response_time_ms,
                status_code,
                error: Some(error),
            }
        }
    }
}
