//! Enrollment as exposed to foreign language bindings.
//!
//! The host supplies the device key pair through [`DeviceKeyPair`] and receives the enrollment as
//! plain records it can persist in its own secure storage.

use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;

use crate::api::ApiClient;
use crate::config::{ClientConfig, PushService};
use crate::device::{DeviceIdentity, EnrolledDevice, Totp};
use crate::enroll::{EnrollParams, EnrollRequest};
use crate::error::{GuardKitError, GuardKitResult};
use crate::hooks::Hooks;
use crate::keys::{Jwk, SigningKey, VerificationKey};
use crate::request::Requestable;

/// Errors raised by a host key implementation.
#[derive(Debug, Error, uniffi::Error)]
pub enum KeyError {
    /// The key could not be read or used.
    #[error("key unavailable: {0}")]
    Unavailable(String),

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for KeyError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

impl From<KeyError> for GuardKitError {
    fn from(error: KeyError) -> Self {
        Self::InvalidKey(error.to_string())
    }
}

/// RSA key pair of the device, held by the host (e.g. in the Keychain or Android Keystore).
#[uniffi::export(with_foreign)]
pub trait DeviceKeyPair: Send + Sync {
    /// Big-endian modulus of the public key.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be read.
    fn rsa_modulus(&self) -> Result<Vec<u8>, KeyError>;

    /// Big-endian public exponent.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be read.
    fn rsa_exponent(&self) -> Result<Vec<u8>, KeyError>;

    /// Signs `message` with the private key (`RS256`).
    ///
    /// # Errors
    /// Returns an error if the private key cannot be used.
    fn sign(&self, message: Vec<u8>) -> Result<Vec<u8>, KeyError>;
}

struct HostKeyPair(Arc<dyn DeviceKeyPair>);

impl VerificationKey for HostKeyPair {
    fn jwk(&self) -> GuardKitResult<Jwk> {
        let modulus = self.0.rsa_modulus()?;
        let exponent = self.0.rsa_exponent()?;
        Ok(Jwk::rsa(&modulus, &exponent))
    }
}

impl SigningKey for HostKeyPair {
    fn sign(&self, message: &[u8]) -> GuardKitResult<Vec<u8>> {
        Ok(self.0.sign(message.to_vec())?)
    }
}

/// Inputs of an enrollment started from a foreign binding.
#[derive(Clone, uniffi::Record)]
pub struct EnrollmentOptions {
    /// Ticket, as given by the enrollment flow. Takes priority over `enrollment_uri`.
    pub enrollment_ticket: Option<String>,
    /// `otpauth://totp?enrollment_tx_id=…` URI scanned from a QR code.
    pub enrollment_uri: Option<String>,
    /// Push notification token of the device.
    pub notification_token: String,
    /// Identifier persisted by the host. A fresh one is generated when absent.
    pub device_identifier: Option<String>,
    /// Name shown to the user in their enrolled devices list.
    pub device_name: String,
}

/// TOTP parameters of an enrollment.
#[derive(Clone, uniffi::Record)]
#[cfg_attr(test, derive(Debug))]
pub struct TotpParameters {
    /// Base32 encoded shared secret.
    pub secret: String,
    /// `sha1`, `sha256` or `sha512`.
    pub algorithm: String,
    /// Number of digits of each code.
    pub digits: u32,
    /// Validity of each code, in seconds.
    pub period: u32,
}

impl From<&Totp> for TotpParameters {
    fn from(totp: &Totp) -> Self {
        Self {
            secret: totp.secret().expose_secret().to_string(),
            algorithm: totp.algorithm().to_string(),
            digits: totp.digits(),
            period: totp.period(),
        }
    }
}

/// A completed enrollment, for the host to persist.
#[derive(Clone, uniffi::Record)]
#[cfg_attr(test, derive(Debug))]
pub struct DeviceEnrollment {
    /// Server issued identifier of the enrollment.
    pub id: String,
    /// Owner of the enrollment.
    pub user_id: String,
    /// Identifier the device registered with.
    pub device_identifier: String,
    /// Device token for later API calls.
    pub device_token: String,
    /// Push notification token registered with the server.
    pub notification_token: String,
    /// TOTP parameters, absent for push-only enrollments.
    pub totp: Option<TotpParameters>,
}

impl DeviceEnrollment {
    fn new(device: &EnrolledDevice, device_identifier: String) -> Self {
        Self {
            id: device.id().to_string(),
            user_id: device.user_id().to_string(),
            device_identifier,
            device_token: device.device_token().expose_secret().to_string(),
            notification_token: device.notification_token().to_string(),
            totp: device.totp().map(TotpParameters::from),
        }
    }
}

/// Client of a tenant's MFA API.
#[derive(Debug, uniffi::Object)]
pub struct MfaClient(ApiClient);

#[uniffi::export(async_runtime = "tokio")]
impl MfaClient {
    /// Initializes a client for a tenant domain with default settings.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidInput` if the domain does not form a valid `https` URL.
    #[uniffi::constructor]
    pub fn for_domain(domain: &str, push_service: PushService) -> Result<Self, GuardKitError> {
        let config = ClientConfig::for_domain(domain)?.with_push_service(push_service);
        Ok(Self(ApiClient::new(config)))
    }

    /// Initializes a client from a JSON configuration.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidInput` if the JSON is invalid or the base URL is not `https`.
    #[uniffi::constructor]
    pub fn from_json(config: &str) -> Result<Self, GuardKitError> {
        Ok(Self(ApiClient::new(ClientConfig::from_json(config)?)))
    }

    /// Enrolls the device.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidEnrollmentUri` when no ticket can be resolved from
    /// `options`, otherwise any error of the enrollment call.
    pub async fn enroll(
        &self,
        options: EnrollmentOptions,
        key_pair: Arc<dyn DeviceKeyPair>,
    ) -> Result<DeviceEnrollment, GuardKitError> {
        let device = match options.device_identifier {
            Some(identifier) => DeviceIdentity::new(identifier, options.device_name),
            None => DeviceIdentity::generate(options.device_name),
        };
        let device_identifier = device.identifier.clone();
        let keys = Arc::new(HostKeyPair(key_pair));

        let params = EnrollParams {
            enrollment_ticket: options.enrollment_ticket,
            enrollment_uri: options.enrollment_uri,
            notification_token: options.notification_token,
            device,
            verification_key: keys.clone(),
            signing_key: keys,
        };

        let enrolled = EnrollRequest::new(&self.0, params)
            .on(Hooks::logging())
            .start()
            .await?;
        Ok(DeviceEnrollment::new(&enrolled, device_identifier))
    }
}
