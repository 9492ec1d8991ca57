//! Key material handed to the client by the host application.
//!
//! The host generates (and stores) an asymmetric key pair. The public half is sent to the server
//! during enrollment as a JSON Web Key. The private half never leaves the device: it is attached to
//! the resulting [`crate::EnrolledDevice`] and later used to sign authentication challenges.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

use crate::error::GuardKitResult;

/// The public half of the device key pair.
pub trait VerificationKey: Send + Sync {
    /// Exports the key as a JSON Web Key.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidKey` if the key cannot be exported.
    fn jwk(&self) -> GuardKitResult<Jwk>;
}

/// The private half of the device key pair.
///
/// Implementations should keep the key material out of `Debug`/`Display` output.
pub trait SigningKey: Send + Sync {
    /// Signs `message`, returning the raw signature bytes.
    ///
    /// # Errors
    /// Returns `GuardKitError::InvalidKey` if signing fails.
    fn sign(&self, message: &[u8]) -> GuardKitResult<Vec<u8>>;
}

/// A public key in JSON Web Key format, as expected by the enrollment endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Jwk {
    /// Key type, e.g. `RSA`.
    pub kty: String,
    /// Intended algorithm, e.g. `RS256`.
    pub alg: String,
    /// Public key use, always `sig` for device keys.
    #[serde(rename = "use")]
    pub key_use: String,
    /// RSA modulus, base64url without padding.
    pub n: String,
    /// RSA public exponent, base64url without padding.
    pub e: String,
}

impl Jwk {
    /// Builds an `RS256` signing JWK from the big-endian RSA modulus and exponent.
    #[must_use]
    pub fn rsa(modulus: &[u8], exponent: &[u8]) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: "RS256".to_string(),
            key_use: "sig".to_string(),
            n: URL_SAFE_NO_PAD.encode(modulus),
            e: URL_SAFE_NO_PAD.encode(exponent),
        }
    }
}
