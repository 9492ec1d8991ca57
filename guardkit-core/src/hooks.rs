//! Observation points on the lifecycle of a request.
//!
//! Hooks are pure instrumentation: they see what is sent and received but cannot change the
//! request or its result. For a single `start`, `on_request` runs first (once a request is actually
//! sent) and is followed by at most one of `on_response` or `on_error`.

use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::GuardKitError;

/// What is about to be sent.
#[derive(Debug)]
pub struct RequestInfo<'a> {
    /// HTTP method
    pub method: &'a Method,
    /// Target URL
    pub url: &'a Url,
    /// Request headers. Credentials are marked sensitive.
    pub headers: &'a HeaderMap,
    /// JSON body, if any
    pub body: Option<&'a serde_json::Value>,
}

/// A response received from the server, whatever its status.
#[derive(Debug)]
pub struct ResponseInfo<'a> {
    /// URL the request was sent to
    pub url: &'a Url,
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: &'a HeaderMap,
    /// Raw response body
    pub body: &'a [u8],
}

/// Called right before the request is sent.
pub type RequestHook = Arc<dyn Fn(&RequestInfo<'_>) + Send + Sync>;
/// Called when a response is received.
pub type ResponseHook = Arc<dyn Fn(&ResponseInfo<'_>) + Send + Sync>;
/// Called when no response could be obtained.
pub type ErrorHook = Arc<dyn Fn(&GuardKitError) + Send + Sync>;

/// Set of hooks registered on a request. Every hook is optional.
#[derive(Clone, Default)]
pub struct Hooks {
    request: Option<RequestHook>,
    response: Option<ResponseHook>,
    error: Option<ErrorHook>,
}

impl Hooks {
    /// No hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks writing a `debug` log line for every event. Headers and bodies are never logged.
    #[must_use]
    pub fn logging() -> Self {
        Self::new()
            .on_request(|request| log::debug!("--> {} {}", request.method, request.url))
            .on_response(|response| {
                log::debug!(
                    "<-- {} {} ({} bytes)",
                    response.status.as_u16(),
                    response.url,
                    response.body.len()
                );
            })
            .on_error(|error| log::debug!("<-- request failed: {error}"))
    }

    /// Registers the hook called on request being sent.
    #[must_use]
    pub fn on_request(mut self, hook: impl Fn(&RequestInfo<'_>) + Send + Sync + 'static) -> Self {
        self.request = Some(Arc::new(hook));
        self
    }

    /// Registers the hook called on response received, successful or not.
    #[must_use]
    pub fn on_response(
        mut self,
        hook: impl Fn(&ResponseInfo<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.response = Some(Arc::new(hook));
        self
    }

    /// Registers the hook called on network error.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&GuardKitError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn fire_request(&self, info: &RequestInfo<'_>) {
        if let Some(hook) = &self.request {
            hook(info);
        }
    }

    pub(crate) fn fire_response(&self, info: &ResponseInfo<'_>) {
        if let Some(hook) = &self.response {
            hook(info);
        }
    }

    pub(crate) fn fire_error(&self, error: &GuardKitError) {
        if let Some(hook) = &self.error {
            hook(error);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
