//! Client for the MFA API endpoints used during enrollment.

use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, PushService};
use crate::device::{DeviceIdentity, Totp};
use crate::error::GuardKitError;
use crate::http_request::HttpClient;
use crate::keys::{Jwk, VerificationKey};
use crate::request::ApiRequest;
use crate::ticket::EnrollmentTicket;

pub(crate) const ENROLL_PATH: &str = "api/enroll";

/// Builds the requests of the MFA API. Building a request performs no I/O.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: HttpClient,
}

/// Body of `POST /api/enroll`.
#[derive(Serialize)]
struct DeviceRegistration<'a> {
    identifier: &'a str,
    name: &'a str,
    push_credentials: PushCredentials<'a>,
    public_key: Jwk,
}

#[derive(Serialize)]
struct PushCredentials<'a> {
    service: PushService,
    token: &'a str,
}

/// Response of `POST /api/enroll`.
///
/// `id`, `user_id` and `token` are required, a response without them fails to decode. `totp` is
/// absent for push-only enrollments.
#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
pub struct EnrollmentPayload {
    /// Identifier of the new enrollment.
    pub id: String,
    /// Owner of the enrollment.
    pub user_id: String,
    /// Device token for later API calls.
    pub token: String,
    /// TOTP parameters.
    #[serde(default)]
    pub totp: Option<Totp>,
}

impl ApiClient {
    /// Creates a client for the given configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let http = HttpClient::new(&config);
        Self { config, http }
    }

    /// The configuration the client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds the enrollment call: `POST /api/enroll` authorized by the ticket, registering the
    /// device, its notification token and its public key.
    ///
    /// When the public key cannot be exported the request is built in a failed state carrying that
    /// error. So is a ticket containing `"` or `\`, which cannot be carried in the quoted header
    /// value.
    #[must_use]
    pub fn enroll(
        &self,
        ticket: &EnrollmentTicket,
        device: &DeviceIdentity,
        notification_token: &str,
        verification_key: &dyn VerificationKey,
    ) -> ApiRequest<EnrollmentPayload> {
        let url = self.config.endpoint(ENROLL_PATH);
        if ticket.as_str().contains(['"', '\\']) {
            let error = GuardKitError::InvalidInput {
                attribute: "enrollment_ticket".to_string(),
                reason: "must not contain quotes or backslashes".to_string(),
            };
            return ApiRequest::failed(Method::POST, url, error);
        }
        let public_key = match verification_key.jwk() {
            Ok(jwk) => jwk,
            Err(error) => return ApiRequest::failed(Method::POST, url, error),
        };

        let registration = DeviceRegistration {
            identifier: &device.identifier,
            name: &device.name,
            push_credentials: PushCredentials {
                service: self.config.push_service,
                token: notification_token,
            },
            public_key,
        };

        ApiRequest::new(self.http.clone(), Method::POST, url)
            .sensitive_header(
                AUTHORIZATION,
                &format!("Ticket id=\"{}\"", ticket.as_str()),
            )
            .json(&registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardKitResult;
    use crate::request::Requestable;
    use mockito::{Matcher, Server};
    use secrecy::ExposeSecret;
    use serde_json::json;
    use test_case::test_case;

    struct StaticKey;

    impl VerificationKey for StaticKey {
        fn jwk(&self) -> GuardKitResult<Jwk> {
            Ok(Jwk::rsa(&[0xff, 0xfe, 0x01], &[0x01, 0x00, 0x01]))
        }
    }

    struct UnexportableKey;

    impl VerificationKey for UnexportableKey {
        fn jwk(&self) -> GuardKitResult<Jwk> {
            Err(GuardKitError::InvalidKey("key is not exportable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_enroll_request_shape() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/enroll")
            .match_header("authorization", "Ticket id=\"ticket_123\"")
            .match_header("content-type", "application/json")
            .match_header(
                "user-agent",
                Matcher::Regex("^guardkit-core/".to_string()),
            )
            .match_body(Matcher::Json(json!({
                "identifier": "device-id",
                "name": "Test Phone",
                "push_credentials": {"service": "GCM", "token": "push_token"},
                "public_key": {
                    "kty": "RSA",
                    "alg": "RS256",
                    "use": "sig",
                    "n": "__4B",
                    "e": "AQAB",
                },
            })))
            .with_status(200)
            .with_body(
                json!({
                    "id": "dev_1",
                    "user_id": "auth0|user",
                    "token": "device_token",
                    "totp": {"secret": "JBSWY3DPEHPK3PXP", "digits": 8}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = ApiClient::new(
            ClientConfig::with_base_url(&server.url()).with_push_service(PushService::Gcm),
        );
        let payload = api
            .enroll(
                &EnrollmentTicket::new("ticket_123").unwrap(),
                &DeviceIdentity::new("device-id", "Test Phone"),
                "push_token",
                &StaticKey,
            )
            .start()
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(payload.id, "dev_1");
        assert_eq!(payload.user_id, "auth0|user");
        assert_eq!(payload.token, "device_token");
        let totp = payload.totp.unwrap();
        assert_eq!(totp.secret().expose_secret(), "JBSWY3DPEHPK3PXP");
        assert_eq!(totp.digits(), 8);
    }

    #[tokio::test]
    async fn test_unexportable_key_fails_without_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/enroll")
            .expect(0)
            .create_async()
            .await;

        let api = ApiClient::new(ClientConfig::with_base_url(&server.url()));
        let request = api.enroll(
            &EnrollmentTicket::new("ticket_123").unwrap(),
            &DeviceIdentity::new("device-id", "Test Phone"),
            "push_token",
            &UnexportableKey,
        );
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().path(), "/api/enroll");

        let err = request.start().await.unwrap_err();
        mock.assert_async().await;
        assert_eq!(
            err,
            GuardKitError::InvalidKey("key is not exportable".to_string())
        );
    }

    #[test]
    fn test_client_is_built_from_validated_config() {
        let config = ClientConfig::for_domain("tenant.guardian.example.com").unwrap();
        let api = ApiClient::new(config.clone());
        assert_eq!(api.config(), &config);
        assert_eq!(
            api.config().endpoint(ENROLL_PATH).as_str(),
            "https://tenant.guardian.example.com/api/enroll"
        );
    }

    #[test_case("tick\"et" ; "quote")]
    #[test_case("tick\\et" ; "backslash")]
    #[tokio::test]
    async fn test_unquotable_ticket_fails_without_network(ticket: &str) {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/enroll")
            .expect(0)
            .create_async()
            .await;

        let api = ApiClient::new(ClientConfig::with_base_url(&server.url()));
        let err = api
            .enroll(
                &EnrollmentTicket::new(ticket).unwrap(),
                &DeviceIdentity::new("device-id", "Test Phone"),
                "push_token",
                &StaticKey,
            )
            .start()
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err,
            GuardKitError::InvalidInput { attribute, .. } if attribute == "enrollment_ticket"
        ));
    }
}
