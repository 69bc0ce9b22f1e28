//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Dump requests and responses through a `LoggingObserver`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level from config, overridden by `RUST_LOG`
//! - Token-bearing headers are masked unless redaction is turned off

use reqwest::header::{HeaderMap, HeaderName, AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;
use crate::error::ChainError;
use crate::http::{PreparedRequest, RawResponse};
use crate::observability::observer::{EventObserver, ObserverError, RequestOutcome};

const REDACTED: &str = "<redacted>";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("http_interceptor={}", config.log_level).into());

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    }
}

/// Pretty-print a JSON body; `None` when the bytes are not JSON.
pub fn pretty_json(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

/// Render headers as `name: value` pairs, masking secrets when asked.
pub fn render_headers(headers: &HeaderMap, redact: bool, secret_headers: &[HeaderName]) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if redact && secret_headers.contains(name) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            format!("{}: {}", name, shown)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Logs every request and parsed response at debug level.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    redact_secrets: bool,
    log_bodies: bool,
    secret_headers: Vec<HeaderName>,
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self {
            redact_secrets: true,
            log_bodies: true,
            secret_headers: vec![
                AUTHORIZATION,
                PROXY_AUTHORIZATION,
                COOKIE,
                HeaderName::from_static("refresh-token"),
            ],
        }
    }
}

impl LoggingObserver {
    pub fn new(config: &ObservabilityConfig) -> Self {
        Self {
            redact_secrets: config.redact_secrets,
            log_bodies: config.log_bodies,
            ..Self::default()
        }
    }

    /// Also mask `header`.
    pub fn with_secret_header(mut self, header: HeaderName) -> Self {
        if !self.secret_headers.contains(&header) {
            self.secret_headers.push(header);
        }
        self
    }

    pub fn describe_headers(&self, headers: &HeaderMap) -> String {
        render_headers(headers, self.redact_secrets, &self.secret_headers)
    }

    fn describe_body(&self, body: Option<&[u8]>) -> String {
        match body {
            Some(bytes) if self.log_bodies => {
                pretty_json(bytes).unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
            }
            Some(bytes) => format!("<{} bytes>", bytes.len()),
            None => String::new(),
        }
    }
}

impl EventObserver for LoggingObserver {
    fn on_request_finish(
        &self,
        request: &PreparedRequest,
        outcome: RequestOutcome<'_>,
    ) -> Result<(), ObserverError> {
        let headers = self.describe_headers(request.headers());
        let body = self.describe_body(request.body());
        match outcome {
            RequestOutcome::Response(response) => tracing::debug!(
                method = %request.method(),
                url = %request.url(),
                headers = %headers,
                body = %body,
                status = response.status.as_u16(),
                "Request finished"
            ),
            RequestOutcome::Failed(error) => tracing::debug!(
                method = %request.method(),
                url = %request.url(),
                headers = %headers,
                body = %body,
                error = %error,
                "Request failed"
            ),
        }
        Ok(())
    }

    fn on_response_parsed(
        &self,
        request: &PreparedRequest,
        response: &RawResponse,
        result: Result<(), &ChainError>,
    ) -> Result<(), ObserverError> {
        let data = self.describe_body(Some(response.body.as_slice()));
        match result {
            Ok(()) => tracing::debug!(
                url = %request.url(),
                status = response.status.as_u16(),
                data = %data,
                "Response parsed"
            ),
            Err(error) => tracing::debug!(
                url = %request.url(),
                status = response.status.as_u16(),
                data = %data,
                error = %error,
                "Response could not be parsed"
            ),
        }
        Ok(())
    }
}
