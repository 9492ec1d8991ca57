use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GuardKitError, GuardKitResult};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RETRIES: u32 = 3; // total attempts = 4

/// Push notification service the notification token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Enum)]
pub enum PushService {
    /// Apple Push Notification service
    #[default]
    #[serde(rename = "APNS")]
    Apns,
    /// Firebase / Google Cloud Messaging
    #[serde(rename = "GCM")]
    Gcm,
}

/// Configuration of the API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the tenant's MFA API, e.g. `https://tenant.guardian.example.com/`.
    pub base_url: Url,
    /// Per-attempt request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for failures where the server did not process the request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Service the notification tokens are issued by.
    #[serde(default)]
    pub push_service: PushService,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl ClientConfig {
    /// Creates a configuration with defaults for the given base URL.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidInput` if the URL is not a valid `https` URL.
    pub fn new(base_url: &str) -> GuardKitResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| GuardKitError::InvalidInput {
            attribute: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        Self {
            base_url,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            push_service: PushService::default(),
        }
        .validated()
    }

    /// Creates a configuration for a tenant domain. `https://` is prepended unless already present.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidInput` if the domain does not form a valid URL.
    pub fn for_domain(domain: &str) -> GuardKitResult<Self> {
        if domain.starts_with("https://") {
            Self::new(domain)
        } else {
            Self::new(&format!("https://{domain}"))
        }
    }

    /// Deserializes a configuration from JSON. Missing optional fields take their defaults.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidInput` if the JSON is invalid or the base URL is not `https`.
    pub fn from_json(json: &str) -> GuardKitResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| GuardKitError::InvalidInput {
                attribute: "config".to_string(),
                reason: e.to_string(),
            })?;
        config.validated()
    }

    /// Sets the push notification service.
    #[must_use]
    pub const fn with_push_service(mut self, push_service: PushService) -> Self {
        self.push_service = push_service;
        self
    }

    /// Sets the number of retries for transient failures.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The per-attempt request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolves `path` below the base URL, keeping any path prefix of the base.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url
    }

    fn validated(self) -> GuardKitResult<Self> {
        if self.base_url.scheme() != "https" {
            return Err(GuardKitError::InvalidInput {
                attribute: "base_url".to_string(),
                reason: "must use https".to_string(),
            });
        }
        if self.base_url.cannot_be_a_base() {
            return Err(GuardKitError::InvalidInput {
                attribute: "base_url".to_string(),
                reason: "must be able to carry a path".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
impl ClientConfig {
    /// Create a configuration pointing at a local mock server, skipping the `https` check.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: Url::parse(base_url).unwrap(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
            push_service: PushService::default(),
        }
    }
}
