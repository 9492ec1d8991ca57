//! The device being enrolled and the record produced by a successful enrollment.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::keys::SigningKey;

const DEFAULT_TOTP_DIGITS: u32 = 6;
const DEFAULT_TOTP_PERIOD: u32 = 30;

/// How the device presents itself to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Stable identifier of the device, unique per host application.
    pub identifier: String,
    /// Human readable name shown to the user in their enrolled devices list.
    pub name: String,
}

impl DeviceIdentity {
    /// Creates a device identity from known values.
    #[must_use]
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
        }
    }

    /// Creates a device identity with a fresh random identifier. The host is expected to persist
    /// the identifier and reuse it for the lifetime of the installation.
    #[must_use]
    pub fn generate(name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), name)
    }
}

/// Hash algorithm used to compute one-time codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TotpAlgorithm {
    /// HMAC-SHA1, the default for authenticator apps.
    #[default]
    Sha1,
    /// HMAC-SHA256
    Sha256,
    /// HMAC-SHA512
    Sha512,
}

/// TOTP parameters issued by the server on enrollment.
#[derive(Debug, Deserialize)]
#[serde(try_from = "TotpPayload")]
pub struct Totp {
    secret: SecretString,
    algorithm: TotpAlgorithm,
    digits: u32,
    period: u32,
}

impl Totp {
    /// The base32 encoded shared secret.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// The hash algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> TotpAlgorithm {
        self.algorithm
    }

    /// Number of digits of each code.
    #[must_use]
    pub const fn digits(&self) -> u32 {
        self.digits
    }

    /// Validity of each code, in seconds.
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }
}

#[derive(Deserialize)]
struct TotpPayload {
    secret: String,
    #[serde(default)]
    algorithm: Option<String>,
    #[serde(default)]
    digits: Option<u32>,
    #[serde(default)]
    period: Option<u32>,
}

impl TryFrom<TotpPayload> for Totp {
    type Error = String;

    fn try_from(payload: TotpPayload) -> Result<Self, Self::Error> {
        let algorithm = payload
            .algorithm
            .as_deref()
            .map(TotpAlgorithm::from_str)
            .transpose()
            .map_err(|_| {
                format!(
                    "unsupported totp algorithm: {}",
                    payload.algorithm.as_deref().unwrap_or_default()
                )
            })?
            .unwrap_or_default();

        Ok(Self {
            secret: SecretString::from(payload.secret),
            algorithm,
            digits: payload.digits.unwrap_or(DEFAULT_TOTP_DIGITS),
            period: payload.period.unwrap_or(DEFAULT_TOTP_PERIOD),
        })
    }
}

/// A device registered with the server as a second factor.
///
/// Only produced by a successful enrollment. Holds everything later operations need: the server
/// issued identifiers and token, the push notification token, the private signing key and, when
/// the enrollment included one, the TOTP seed.
pub struct EnrolledDevice {
    id: String,
    user_id: String,
    device_token: SecretString,
    notification_token: String,
    signing_key: Arc<dyn SigningKey>,
    totp: Option<Totp>,
}

impl EnrolledDevice {
    pub(crate) fn new(
        id: String,
        user_id: String,
        device_token: SecretString,
        notification_token: String,
        signing_key: Arc<dyn SigningKey>,
        totp: Option<Totp>,
    ) -> Self {
        Self {
            id,
            user_id,
            device_token,
            notification_token,
            signing_key,
            totp,
        }
    }

    /// Server issued identifier of the enrollment.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifier of the user that owns the enrollment.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Token authenticating this device on subsequent API calls.
    #[must_use]
    pub fn device_token(&self) -> &SecretString {
        &self.device_token
    }

    /// Push notification token the device was enrolled with.
    #[must_use]
    pub fn notification_token(&self) -> &str {
        &self.notification_token
    }

    /// The private key paired with the public key sent during enrollment.
    #[must_use]
    pub fn signing_key(&self) -> &Arc<dyn SigningKey> {
        &self.signing_key
    }

    /// TOTP parameters, absent for push-only enrollments.
    #[must_use]
    pub const fn totp(&self) -> Option<&Totp> {
        self.totp.as_ref()
    }
}

impl fmt::Debug for EnrolledDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrolledDevice")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("device_token", &self.device_token)
            .field("notification_token", &self.notification_token)
            .field("signing_key", &"[REDACTED]")
            .field("totp", &self.totp)
            .finish()
    }
}

impl PartialEq for EnrolledDevice {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.user_id == other.user_id
            && self.device_token.expose_secret() == other.device_token.expose_secret()
            && self.notification_token == other.notification_token
            && Arc::ptr_eq(&self.signing_key, &other.signing_key)
            && self.totp == other.totp
    }
}

impl PartialEq for Totp {
    fn eq(&self, other: &Self) -> bool {
        self.secret.expose_secret() == other.secret.expose_secret()
            && self.algorithm == other.algorithm
            && self.digits == other.digits
            && self.period == other.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_totp_defaults() {
        let totp: Totp =
            serde_json::from_str(r#"{"secret": "JBSWY3DPEHPK3PXP"}"#).unwrap();
        assert_eq!(totp.secret().expose_secret(), "JBSWY3DPEHPK3PXP");
        assert_eq!(totp.algorithm(), TotpAlgorithm::Sha1);
        assert_eq!(totp.digits(), 6);
        assert_eq!(totp.period(), 30);
    }

    #[test_case("sha1", TotpAlgorithm::Sha1)]
    #[test_case("SHA256", TotpAlgorithm::Sha256)]
    #[test_case("sha512", TotpAlgorithm::Sha512)]
    fn test_totp_algorithm(raw: &str, expected: TotpAlgorithm) {
        let totp: Totp = serde_json::from_value(serde_json::json!({
            "secret": "JBSWY3DPEHPK3PXP",
            "algorithm": raw,
            "digits": 8,
            "period": 60,
        }))
        .unwrap();
        assert_eq!(totp.algorithm(), expected);
        assert_eq!(totp.digits(), 8);
        assert_eq!(totp.period(), 60);
    }

    #[test]
    fn test_totp_rejects_unknown_algorithm() {
        let err = serde_json::from_str::<Totp>(r#"{"secret": "S", "algorithm": "md5"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported totp algorithm: md5"));
    }

    #[test]
    fn test_totp_requires_secret() {
        assert!(serde_json::from_str::<Totp>(r#"{"digits": 6}"#).is_err());
    }

    #[test]
    fn test_generated_identity_is_unique() {
        let first = DeviceIdentity::generate("Phone");
        let second = DeviceIdentity::generate("Phone");
        assert_eq!(first.name, "Phone");
        assert_ne!(first.identifier, second.identifier);
        assert!(Uuid::parse_str(&first.identifier).is_ok());
    }
}
