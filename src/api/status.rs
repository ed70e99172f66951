use crate::service::ConnectivityService;
use partsmart_core::client::ListenerId;
use partsmart_core::{ConnectionStatus, ResolvedConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadgeTone {
    Online,
    Offline,
    /// No check has completed yet
    Unknown,
}

/// Connection badge shown in the app header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: String,
    pub tone: BadgeTone,
    /// Latency when online, error text when offline
    pub detail: Option<String>,
}

impl StatusBadge {
    pub fn from_status(status: Option<&ConnectionStatus>) -> Self {
        match status {
            None => Self {
                label: "Checking…".to_string(),
                tone: BadgeTone::Unknown,
                detail: None,
            },
            Some(s) if s.is_connected => Self {
                label: "Online".to_string(),
                tone: BadgeTone::Online,
                detail: Some(format_latency(s.response_time_ms)),
            },
            Some(s) => Self {
                label: "Offline".to_string(),
                tone: BadgeTone::Offline,
                detail: s.error.clone(),
            },
        }
    }
}

pub fn format_latency(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

/// Badge for the last known status, without probing.
pub fn status_badge(service: &ConnectivityService) -> StatusBadge {
    StatusBadge::from_status(service.prober().last_status().as_ref())
}

/// Cached when fresh, otherwise probes.
pub fn check_now(service: &ConnectivityService) -> ConnectionStatus {
    service.block_on(service.prober().check_connection())
}

pub fn test_current_environment(service: &ConnectivityService) -> bool {
    service.block_on(service.resolver().test_current_environment())
}

/// Re-resolve after a network change; the connection cache is dropped too.
pub fn rescan(service: &ConnectivityService) -> ResolvedConfig {
    let config = service.block_on(service.resolver().rescan());
    service.prober().invalidate_cache();
    (*config).clone()
}

pub fn start_monitoring(service: &ConnectivityService) {
    service.start_monitoring();
}

pub fn stop_monitoring(service: &ConnectivityService) {
    service.stop_monitoring();
}

/// Receive every probe result. The callback runs on a runtime worker thread.
pub fn subscribe<F>(service: &ConnectivityService, callback: F) -> ListenerId
where
    F: Fn(&ConnectionStatus) + Send + Sync + 'static,
{
    service.prober().add_listener(callback)
}

pub fn unsubscribe(service: &ConnectivityService, id: ListenerId) -> bool {
    service.prober().remove_listener(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{LOCAL, PROD, test_service};
    use partsmart_core::store::SELECTED_ENVIRONMENT_KEY;
    use partsmart_core::KeyValueStore;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn badge_variants() {
        assert_eq!(StatusBadge::from_status(None).tone, BadgeTone::Unknown);

        let online = ConnectionStatus::connected(PROD, 120);
        let badge = StatusBadge::from_status(Some(&online));
        assert_eq!(badge.label, "Online");
        assert_eq!(badge.detail.as_deref(), Some("120ms"));

        let offline = ConnectionStatus::failed(PROD, 8000, "request timed out after 8000ms");
        let badge = StatusBadge::from_status(Some(&offline));
        assert_eq!(badge.tone, BadgeTone::Offline);
        assert_eq!(badge.detail.as_deref(), Some("request timed out after 8000ms"));
    }

    #[test]
    fn latency_formatting() {
        assert_eq!(format_latency(0), "0ms");
        assert_eq!(format_latency(999), "999ms");
        assert_eq!(format_latency(1500), "1.5s");
    }

    #[test]
    fn check_now_updates_badge_and_notifies() {
        let t = test_service();
        t.transport
            .respond(&format!("{}/health", PROD), 200, r#"{"success":true}"#);
        assert_eq!(status_badge(&t.service).tone, BadgeTone::Unknown);

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let id = subscribe(&t.service, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(check_now(&t.service).is_connected);
        assert_eq!(status_badge(&t.service).tone, BadgeTone::Online);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(unsubscribe(&t.service, id));
    }

    #[test]
    fn rescan_picks_up_new_selection() {
        let t = test_service();
        assert_eq!(crate::api::environment::current_base_url(&t.service), PROD);

        t.raw.set(SELECTED_ENVIRONMENT_KEY, "local").unwrap();
        t.transport
            .respond(&format!("{}/health", LOCAL), 200, r#"{"success":true}"#);
        let config = rescan(&t.service);
        assert_eq!(config.base_url, LOCAL);
        assert!(config.is_working);
        assert!(test_current_environment(&t.service));
    }
}
