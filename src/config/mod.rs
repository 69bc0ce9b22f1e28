//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → InterceptorConfig (validated, immutable)
//!     → passed by reference into the chain builder
//! ```
//!
//! # Design Decisions
//! - Config is an explicit value handed to constructors; there is no global session
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AuthConfig;
pub use schema::InterceptorConfig;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;
pub use validation::{validate_config, ValidationError};
