pub mod environment;
pub mod probe;
pub mod selection;
pub mod store;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

pub use environment::{BackendEnvironment, EnvironmentRegistry, RegistryError};
pub use probe::{ProbeTarget, SuccessRule};
pub use selection::SelectionStore;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use types::{
    ApiEnvelope, ConnectionStatus, DiagnosticEntry, DiagnosticReport, EndpointCheck,
    ResolutionSource, ResolvedConfig,
};
