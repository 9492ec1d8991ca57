//! Enrollment through the public API, without network access.

use std::sync::{Arc, Mutex};

use guardkit_core::{
    resolve_ticket, ticket_from_uri, ApiClient, ClientConfig, DeviceIdentity, EnrollParams,
    EnrollRequest, GuardKitError, GuardKitResult, Hooks, Jwk, Requestable, SigningKey,
    TicketResolution, VerificationKey,
};

struct TestKeyPair;

impl VerificationKey for TestKeyPair {
    fn jwk(&self) -> GuardKitResult<Jwk> {
        Ok(Jwk::rsa(&[0xc0, 0xff, 0xee], &[0x01, 0x00, 0x01]))
    }
}

impl SigningKey for TestKeyPair {
    fn sign(&self, message: &[u8]) -> GuardKitResult<Vec<u8>> {
        Ok(message.to_vec())
    }
}

fn api() -> ApiClient {
    ApiClient::new(ClientConfig::for_domain("tenant.guardian.example.com").unwrap())
}

fn enroll_params(ticket: Option<&str>, uri: Option<&str>) -> EnrollParams {
    EnrollParams {
        enrollment_ticket: ticket.map(ToString::to_string),
        enrollment_uri: uri.map(ToString::to_string),
        notification_token: "push1".to_string(),
        device: DeviceIdentity::generate("Integration Phone"),
        verification_key: Arc::new(TestKeyPair),
        signing_key: Arc::new(TestKeyPair),
    }
}

#[test]
fn test_ticket_resolution_properties() {
    assert_eq!(
        ticket_from_uri("otpauth://totp?enrollment_tx_id=ABC123")
            .unwrap()
            .as_str(),
        "ABC123"
    );
    assert!(ticket_from_uri("otpauth://hotp?enrollment_tx_id=ABC123").is_none());
    assert!(ticket_from_uri("https://totp?enrollment_tx_id=ABC123").is_none());

    match resolve_ticket(None, Some("otpauth://totp?enrollment_tx_id=AAA&enrollment_tx_id=BBB")) {
        TicketResolution::Resolved(ticket) => assert_eq!(ticket.as_str(), "BBB"),
        TicketResolution::Unresolved => panic!("Expected a ticket"),
    }

    for ticket in ["t", "ticket-with-dashes", "otpauth://hotp?enrollment_tx_id=X"] {
        match resolve_ticket(Some(ticket), Some("otpauth://totp?enrollment_tx_id=OTHER")) {
            TicketResolution::Resolved(resolved) => assert_eq!(resolved.as_str(), ticket),
            TicketResolution::Unresolved => panic!("Expected a ticket"),
        }
    }
}

#[tokio::test]
async fn test_missing_ticket_fails_locally() {
    let fired = Arc::new(Mutex::new(0_u32));
    let counter = fired.clone();
    let hooks = Hooks::new().on_request(move |_| *counter.lock().unwrap() += 1);

    let request = EnrollRequest::new(&api(), enroll_params(None, None)).on(hooks);
    assert!(!request.is_resolved());
    assert_eq!(
        request.to_string(),
        "POST https://tenant.guardian.example.com/api/enroll"
    );

    let err = request.start().await.unwrap_err();
    assert_eq!(err, GuardKitError::InvalidEnrollmentUri);
    assert_eq!(*fired.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_unusable_uri_fails_locally() {
    let request = EnrollRequest::new(
        &api(),
        enroll_params(None, Some("otpauth://totp?secret=JBSWY3DPEHPK3PXP")),
    );

    let err = request.start().await.unwrap_err();
    assert_eq!(err, GuardKitError::InvalidEnrollmentUri);
}

#[test]
fn test_resolved_request_is_described_without_sending() {
    let request = EnrollRequest::new(
        &api(),
        enroll_params(None, Some("otpauth://totp?enrollment_tx_id=ABC123")),
    );
    assert!(request.is_resolved());
    assert_eq!(
        request.to_string(),
        "POST https://tenant.guardian.example.com/api/enroll"
    );
    assert!(!format!("{request:?}").contains("ABC123"));
}
