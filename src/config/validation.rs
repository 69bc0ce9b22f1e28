//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (retry bound, delays, budget ratio)
//! - Check that configured URLs and header names parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InterceptorConfig → Result<(), Vec<ValidationError>>

use reqwest::header::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::InterceptorConfig;

/// Upper bound on retries per logical call.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid URL for {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("max_retries {0} exceeds limit of 10")]
    TooManyRetries(u32),

    #[error("base_delay_ms {base} is greater than max_delay_ms {max}")]
    DelayRange { base: u64, max: u64 },

    #[error("budget_ratio {0} must be in (0, 1]")]
    BudgetRatio(f32),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("invalid metrics address: {0}")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &InterceptorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if Url::parse(&config.base_url).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field: "base_url",
            value: config.base_url.clone(),
        });
    }

    if let Some(refresh_url) = &config.auth.refresh_url {
        if Url::parse(refresh_url).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field: "auth.refresh_url",
                value: refresh_url.clone(),
            });
        }
    }

    if let Some(header) = &config.auth.refresh_token_header {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(header.clone()));
        }
    }

    for name in config.default_headers.keys() {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        }
    }

    let retries = &config.retries;
    if retries.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::TooManyRetries(retries.max_retries));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::DelayRange {
            base: retries.base_delay_ms,
            max: retries.max_delay_ms,
        });
    }
    if !(retries.budget_ratio > 0.0 && retries.budget_ratio <= 1.0) {
        errors.push(ValidationError::BudgetRatio(retries.budget_ratio));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
