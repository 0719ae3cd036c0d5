mod connection;
mod error;
mod http;
mod provider;
mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use connection::{ProviderConnection, READ_TIMEOUT, USER_AGENT, expand_template};
pub use error::{ProviderError, TransportError};
pub use http::{BodyStream, HttpRequest, HttpResponse, HttpTransport, MAX_REDIRECTS, ReqwestTransport};
pub use provider::{Commercial, Provider, Release, ResourceId, TrackedProvider};
pub use version::{Identifier, Version};
