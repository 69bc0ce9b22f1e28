//! HTTP layer: requests, responses, transport and generic adapters.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor (caller)
//!     → request.rs prepare() (URL + query/body encoding)
//!     → authenticator adaptation (auth module)
//!     → adapter.rs RequestAdapters, in order
//!     → transport.rs Transport::send
//!     → response.rs RawResponse → decode into caller type
//! ```

pub mod adapter;
pub mod request;
pub mod response;
pub mod transport;

pub use adapter::{DefaultHeadersAdapter, RequestAdapter, RequestIdAdapter, ScopedTokenAdapter};
pub use request::{PreparedRequest, RequestDescriptor, RequestParams};
pub use response::RawResponse;
pub use transport::{ReqwestTransport, Transport, TransportError};
