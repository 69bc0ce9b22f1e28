//! Request description and preparation.
//!
//! # Responsibilities
//! - Describe a logical call (method, base URL, path, headers, parameters)
//! - Encode parameters as a query string or a JSON body
//! - Produce the concrete `PreparedRequest` that adapters and the transport see
//!
//! # Design Decisions
//! - Both types are values; every adaptation returns a new request
//! - Setting a header replaces any previous value, so later writes win

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{ChainError, ChainResult};

/// How request parameters are encoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestParams {
    #[default]
    None,
    /// Flattened into the URL query string. Must be a JSON object.
    Query(Value),
    /// Serialized as a JSON body.
    Body(Value),
}

/// A logical call as submitted by the caller.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub base_url: Url,
    pub path: String,
    pub headers: HeaderMap,
    pub params: RequestParams,
}

impl RequestDescriptor {
    pub fn new(method: Method, base_url: Url, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url,
            path: path.into(),
            headers: HeaderMap::new(),
            params: RequestParams::None,
        }
    }

    pub fn get(base_url: Url, path: impl Into<String>) -> Self {
        Self::new(Method::GET, base_url, path)
    }

    pub fn post(base_url: Url, path: impl Into<String>) -> Self {
        Self::new(Method::POST, base_url, path)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Encode `params` into the query string.
    pub fn with_query<T: Serialize>(mut self, params: &T) -> ChainResult<Self> {
        let value = serde_json::to_value(params)
            .map_err(|e| ChainError::InvalidRequest(format!("query parameters: {}", e)))?;
        self.params = RequestParams::Query(value);
        Ok(self)
    }

    /// Encode `params` as a JSON body.
    pub fn with_body<T: Serialize>(mut self, params: &T) -> ChainResult<Self> {
        let value = serde_json::to_value(params)
            .map_err(|e| ChainError::InvalidRequest(format!("body parameters: {}", e)))?;
        self.params = RequestParams::Body(value);
        Ok(self)
    }

    /// Resolve the URL and encode the parameters.
    pub fn prepare(&self) -> ChainResult<PreparedRequest> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ChainError::InvalidRequest(format!("base URL cannot take a path: {}", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(self.path.split('/').filter(|s| !s.is_empty()));
        }

        let mut headers = self.headers.clone();
        let mut body = None;

        match &self.params {
            RequestParams::None => {}
            RequestParams::Query(value) => {
                let object = value.as_object().ok_or_else(|| {
                    ChainError::InvalidRequest("query parameters must be an object".into())
                })?;
                if !object.is_empty() {
                    let mut pairs = url.query_pairs_mut();
                    for (key, value) in object {
                        match value {
                            Value::Null => {}
                            Value::String(s) => {
                                pairs.append_pair(key, s);
                            }
                            other => {
                                pairs.append_pair(key, &other.to_string());
                            }
                        }
                    }
                }
            }
            RequestParams::Body(value) => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| ChainError::InvalidRequest(format!("body encoding: {}", e)))?;
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                body = Some(bytes);
            }
        }

        Ok(PreparedRequest {
            method: self.method.clone(),
            url,
            headers,
            body,
        })
    }
}

/// A concrete request ready for adaptation and sending.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl PreparedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a header, replacing any existing value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}
