//! Interceptor chain subsystem.
//!
//! # Data Flow
//! ```text
//! caller execute(RequestDescriptor)
//!     → interceptor.rs (state machine, retry bound, observers, metrics)
//!     → coordinator.rs (single-flight credential refresh shared by all calls)
//!     → context.rs (per-call state: stamped credential, retry counters)
//!     → cancel.rs (caller-side cancellation)
//! ```
//!
//! # Design Decisions
//! - One chain is shared by all concurrent calls; per-call state lives in `RequestContext`
//! - Auth retries and generic retries draw on one bound per call
//! - A refresh outlives the call that triggered it

pub mod cancel;
pub mod context;
pub mod coordinator;
pub mod interceptor;

pub use cancel::CancelToken;
pub use context::{CallState, RequestContext};
pub use coordinator::RefreshCoordinator;
pub use interceptor::{InterceptorChain, InterceptorChainBuilder, DEFAULT_MAX_RETRIES};
