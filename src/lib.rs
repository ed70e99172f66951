//! App-facing connectivity layer for the PartsMart storefront and companion apps.
//!
//! Resolves which backend environment requests go to, monitors reachability
//! and exposes plain view models for the selector, status badge and
//! diagnostics screens.

pub mod api;
pub mod service;
pub mod settings;

pub use partsmart_core::{BackendEnvironment, ConnectionStatus, DiagnosticReport, ResolvedConfig};
pub use service::{ConnectivityService, init_app};
pub use settings::AppConfig;
