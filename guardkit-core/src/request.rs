//! Requests to the MFA API.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{GuardKitError, GuardKitResult};
use crate::hooks::{Hooks, RequestInfo, ResponseInfo};
use crate::http_request::HttpClient;

/// Contract shared by every request-like object of the client.
///
/// `Display` gives a short description (`POST https://…/api/enroll`), `Debug` a verbose one with
/// credentials redacted.
///
/// ```rust,ignore
/// let request: impl Requestable = // any request
/// match request.start().await {
///     Ok(payload) => { /* the request finished successfully */ }
///     Err(cause) => { /* something failed, check `cause` */ }
/// }
/// ```
pub trait Requestable: fmt::Display + fmt::Debug + Sized + Send + 'static {
    /// The payload produced on success.
    type Output: Send + 'static;

    /// Registers hooks to be called on specific events:
    ///  * on request being sent
    ///  * on response received (successful or not)
    ///  * on network error
    ///
    /// Replaces any previously registered hooks.
    #[must_use]
    fn on(self, hooks: Hooks) -> Self;

    /// Executes the request. Consumes the request, so it resolves exactly once.
    fn start(self) -> impl Future<Output = GuardKitResult<Self::Output>> + Send;

    /// Executes the request on `runtime` and calls `callback` with the result.
    ///
    /// The callback runs on a worker thread of `runtime`. Dropping the returned handle does not
    /// cancel the request, the callback still fires. If the runtime shuts down before the request
    /// completes the callback is dropped without being called.
    fn start_with<F>(self, runtime: &Handle, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(GuardKitResult<Self::Output>) + Send + 'static,
    {
        runtime.spawn(async move { callback(self.start().await) })
    }
}

/// A request to the API, built but not yet sent. Decodes a JSON `T` on success.
///
/// A request may also be built in a failed state, when something prevented building it. Starting
/// such a request yields the recorded error without any network activity.
pub struct ApiRequest<T> {
    state: RequestState,
    hooks: Hooks,
    payload: PhantomData<fn() -> T>,
}

enum RequestState {
    Ready {
        http: HttpClient,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<serde_json::Value>,
    },
    Failed {
        method: Method,
        url: Url,
        error: GuardKitError,
    },
}

/// Error body returned by the API on non-2xx responses.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerErrorBody {
    error_code: String,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiRequest<T> {
    pub(crate) fn new(http: HttpClient, method: Method, url: Url) -> Self {
        Self {
            state: RequestState::Ready {
                http,
                method,
                url,
                headers: HeaderMap::new(),
                body: None,
            },
            hooks: Hooks::default(),
            payload: PhantomData,
        }
    }

    pub(crate) fn failed(method: Method, url: Url, error: GuardKitError) -> Self {
        Self {
            state: RequestState::Failed { method, url, error },
            hooks: Hooks::default(),
            payload: PhantomData,
        }
    }

    /// Adds a header holding a credential. It is marked sensitive so it never shows in `Debug`.
    pub(crate) fn sensitive_header(mut self, name: HeaderName, value: &str) -> Self {
        if let RequestState::Ready {
            method,
            url,
            headers,
            ..
        } = &mut self.state
        {
            let Ok(mut value) = HeaderValue::from_str(value) else {
                let error = GuardKitError::InvalidInput {
                    attribute: name.as_str().to_string(),
                    reason: "not a valid header value".to_string(),
                };
                return Self::failed(method.clone(), url.clone(), error);
            };
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        self
    }

    /// Sets the JSON body.
    pub(crate) fn json<B: Serialize>(mut self, body: &B) -> Self {
        if let RequestState::Ready {
            method,
            url,
            body: slot,
            ..
        } = &mut self.state
        {
            match serde_json::to_value(body) {
                Ok(value) => *slot = Some(value),
                Err(e) => {
                    let error = GuardKitError::InvalidInput {
                        attribute: "body".to_string(),
                        reason: e.to_string(),
                    };
                    return Self::failed(method.clone(), url.clone(), error);
                }
            }
        }
        self
    }

    /// HTTP method of the request.
    #[must_use]
    pub const fn method(&self) -> &Method {
        match &self.state {
            RequestState::Ready { method, .. } | RequestState::Failed { method, .. } => method,
        }
    }

    /// Target URL of the request.
    #[must_use]
    pub const fn url(&self) -> &Url {
        match &self.state {
            RequestState::Ready { url, .. } | RequestState::Failed { url, .. } => url,
        }
    }
}

impl<T: DeserializeOwned> ApiRequest<T> {
    async fn execute(self) -> GuardKitResult<T> {
        let Self { state, hooks, .. } = self;
        let (http, method, url, headers, body) = match state {
            RequestState::Failed { error, .. } => return Err(error),
            RequestState::Ready {
                http,
                method,
                url,
                headers,
                body,
            } => (http, method, url, headers, body),
        };

        hooks.fire_request(&RequestInfo {
            method: &method,
            url: &url,
            headers: &headers,
            body: body.as_ref(),
        });

        let mut request_builder = http.req(method, url.clone()).headers(headers);
        if let Some(body) = &body {
            request_builder = request_builder.json(body);
        }

        let response = match http.handle(request_builder).await {
            Ok(response) => response,
            Err(error) => {
                hooks.fire_error(&error);
                return Err(error);
            }
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let response_body = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = GuardKitError::from(e);
                hooks.fire_error(&error);
                return Err(error);
            }
        };

        hooks.fire_response(&ResponseInfo {
            url: &url,
            status,
            headers: &response_headers,
            body: &response_body,
        });

        decode(&url, status, &response_body)
    }
}

fn decode<T: DeserializeOwned>(url: &Url, status: StatusCode, body: &[u8]) -> GuardKitResult<T> {
    if status.is_success() {
        return serde_json::from_slice(body).map_err(|e| {
            GuardKitError::InvalidPayload(format!("failed to decode response from {url}: {e}"))
        });
    }

    if let Ok(server_error) = serde_json::from_slice::<ServerErrorBody>(body) {
        return Err(GuardKitError::ServerError {
            status: status.as_u16(),
            code: server_error.error_code,
            message: server_error.message.unwrap_or_default(),
        });
    }

    Err(GuardKitError::NetworkError {
        url: url.to_string(),
        status: Some(status.as_u16()),
        error: String::from_utf8_lossy(body).into_owned(),
    })
}

impl<T> Requestable for ApiRequest<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn on(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    fn start(self) -> impl Future<Output = GuardKitResult<T>> + Send {
        self.execute()
    }
}

impl<T> fmt::Display for ApiRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.url())
    }
}

impl<T> fmt::Debug for ApiRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            RequestState::Ready {
                method,
                url,
                headers,
                body,
                ..
            } => f
                .debug_struct("ApiRequest")
                .field("method", method)
                .field("url", &url.as_str())
                .field("headers", headers)
                .field("body_fields", &body_fields(body.as_ref()))
                .field("hooks", &self.hooks)
                .finish(),
            RequestState::Failed { method, url, error } => f
                .debug_struct("ApiRequest")
                .field("method", method)
                .field("url", &url.as_str())
                .field("error", error)
                .finish(),
        }
    }
}

/// Top level field names of a JSON body. Values are left out, they may hold tokens.
fn body_fields(body: Option<&serde_json::Value>) -> Vec<&str> {
    body.and_then(serde_json::Value::as_object)
        .map(|object| object.keys().map(String::as_str).collect())
        .unwrap_or_default()
}
