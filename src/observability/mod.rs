//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! The chain produces:
//!     → observer.rs (EventObserver callbacks per send and per parse)
//!     → logging.rs (LoggingObserver request/response dump, subscriber setup)
//!     → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Observers are diagnostics only; their failures never reach the caller
//! - Metrics are cheap (facade no-op without a recorder)

pub mod logging;
pub mod metrics;
pub mod observer;

pub use logging::{init_logging, LoggingObserver};
pub use observer::{EventObserver, ObserverError, ObserverSet, RequestOutcome};
