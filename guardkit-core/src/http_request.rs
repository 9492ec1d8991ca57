use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};
use url::Url;

use crate::config::ClientConfig;
use crate::error::GuardKitError;

/// A simple wrapper on an HTTP client for making requests. Sets sensible defaults such as timeouts
/// & user-agent, and applies retry middleware for failures the server never processed.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl HttpClient {
    /// Initializes a new `HttpClient` from the client configuration.
    pub(crate) fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
        }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("guardkit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Handles sending a request built by `req`, with retries for transient failures.
    ///
    /// Enrollment tickets are single use, so only failures where the server did not handle the
    /// request are retried: connection errors, `429` and `503`.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, GuardKitError> {
        let Some(template) = request_builder.try_clone() else {
            return execute_request_builder(request_builder)
                .await
                .or_else(RequestHandleError::into_response);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(
                    "<unknown>".to_string(),
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute_request_builder(request_builder).await
        })
        .retry(backoff)
        .when(RequestHandleError::is_retryable)
        .notify(|err: &RequestHandleError, delay: Duration| {
            log::warn!(
                "retrying request to {} in {delay:?}: {}",
                err.url,
                err.error
            );
        })
        .await
        .or_else(RequestHandleError::into_response)
    }
}

#[derive(Debug)]
struct RequestHandleError {
    url: String,
    error: String,
    retryable: bool,
    response: Option<Response>,
}

impl RequestHandleError {
    fn retryable(url: String, response: Response, error: String) -> Self {
        Self {
            url,
            error,
            retryable: true,
            response: Some(response),
        }
    }

    fn unreachable(url: String, error: String) -> Self {
        Self {
            url,
            error,
            retryable: true,
            response: None,
        }
    }

    fn permanent(url: String, error: String) -> Self {
        Self {
            url,
            error,
            retryable: false,
            response: None,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Once retries are exhausted on a status code, the last response is handed to the caller so
    /// it can be decoded like any other.
    fn into_response(mut self) -> Result<Response, GuardKitError> {
        match self.response.take() {
            Some(response) => Ok(response),
            None => Err(self.into()),
        }
    }
}

impl From<RequestHandleError> for GuardKitError {
    fn from(value: RequestHandleError) -> Self {
        Self::NetworkError {
            url: value.url,
            status: None,
            error: value.error,
        }
    }
}

async fn execute_request_builder(
    request_builder: RequestBuilder,
) -> Result<Response, RequestHandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(
            err.url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();
    log::debug!("{} {url}", request.method());

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == 429 || status == 503 {
                return Err(RequestHandleError::retryable(
                    url,
                    resp,
                    format!("request error with bad status code {status}"),
                ));
            }
            Ok(resp)
        }
        Err(err) => {
            if err.is_connect() {
                return Err(RequestHandleError::unreachable(
                    url,
                    format!("request connect error: {err}"),
                ));
            }

            Err(RequestHandleError::permanent(
                url,
                format!("request failed: {err}"),
            ))
        }
    }
}
