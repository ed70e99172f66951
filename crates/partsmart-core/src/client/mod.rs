pub mod api;
pub mod prober;
pub mod resolver;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use api::{ApiClient, ApiError};
pub use prober::{ConnectivityProber, ListenerId, ProbeSettings};
pub use resolver::{ConfigResolver, FixedNetwork, ResolveError, ResolverSettings};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
