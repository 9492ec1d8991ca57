//! Enrollment ticket resolution.
//!
//! A ticket authorizes exactly one enrollment. It reaches the client either directly, as an opaque
//! string, or embedded in an `otpauth://totp?enrollment_tx_id=<ticket>` URI (usually scanned from a
//! QR code).

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

const OTPAUTH_SCHEME: &str = "otpauth";
const TOTP_HOST: &str = "totp";
const ENROLLMENT_TX_ID: &str = "enrollment_tx_id";

/// A short-lived credential authorizing one enrollment attempt. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct EnrollmentTicket(String);

impl EnrollmentTicket {
    /// Wraps a ticket value. Returns `None` for an empty string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            return None;
        }
        Some(Self(value))
    }

    /// The raw ticket value, as sent to the server.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tickets are credentials, keep them out of logs.
impl fmt::Debug for EnrollmentTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnrollmentTicket(***)")
    }
}

/// Outcome of [`resolve_ticket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketResolution {
    /// A usable ticket was found.
    Resolved(EnrollmentTicket),
    /// Neither the explicit ticket nor the URI yielded a ticket.
    Unresolved,
}

/// Picks the ticket for an enrollment attempt.
///
/// An explicit ticket always wins and the URI is then never looked at, even when the explicit ticket
/// turns out to be unusable (empty). Without an explicit ticket the URI is parsed with
/// [`ticket_from_uri`].
#[must_use]
pub fn resolve_ticket(
    enrollment_ticket: Option<&str>,
    enrollment_uri: Option<&str>,
) -> TicketResolution {
    let ticket = match (enrollment_ticket, enrollment_uri) {
        (Some(ticket), _) => EnrollmentTicket::new(ticket),
        (None, Some(uri)) => ticket_from_uri(uri),
        (None, None) => None,
    };
    ticket.map_or(TicketResolution::Unresolved, TicketResolution::Resolved)
}

/// Extracts the enrollment ticket from an `otpauth://totp` URI.
///
/// The scheme must be exactly `otpauth`, the host is compared case-insensitively against `totp`.
/// When `enrollment_tx_id` appears more than once the last occurrence is used. Query items without
/// a value (no `=`) are ignored. Names and values are percent-decoded only, a `+` stays a `+`.
/// Malformed input yields `None`, never an error.
#[must_use]
pub fn ticket_from_uri(uri: &str) -> Option<EnrollmentTicket> {
    let parsed = Url::parse(uri).ok()?;

    // `Url` normalizes the scheme to lowercase, the check is against the input as written.
    let (scheme, _) = uri.split_once(':')?;
    if scheme != OTPAUTH_SCHEME {
        return None;
    }
    if parsed.host_str()?.to_lowercase() != TOTP_HOST {
        return None;
    }

    let mut parameters = query_parameters(parsed.query()?);
    parameters
        .remove(ENROLLMENT_TX_ID)
        .and_then(EnrollmentTicket::new)
}

fn query_parameters(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|item| item.split_once('='))
        .filter_map(|(name, value)| Some((percent_decode(name)?, percent_decode(value)?)))
        .collect()
}

fn percent_decode(component: &str) -> Option<String> {
    percent_decode_str(component)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ticket(uri: &str) -> Option<String> {
        ticket_from_uri(uri).map(|ticket| ticket.as_str().to_string())
    }

    #[test_case("otpauth://totp?enrollment_tx_id=ABC123", Some("ABC123") ; "plain")]
    #[test_case("otpauth://TOTP?enrollment_tx_id=ABC123", Some("ABC123") ; "host is case insensitive")]
    #[test_case("otpauth://totp/Tenant:user@example.com?secret=JBSWY3DPEHPK3PXP&enrollment_tx_id=ABC123&issuer=Tenant", Some("ABC123") ; "with label and extra parameters")]
    #[test_case("otpauth://totp?enrollment_tx_id=A%2FB", Some("A/B") ; "percent encoded")]
    #[test_case("otpauth://totp?enrollment_tx_id=ab+cd", Some("ab+cd") ; "plus is kept")]
    #[test_case("otpauth://totp?enrollment_tx_id=ab%2Bcd%20ef", Some("ab+cd ef") ; "encoded plus and space")]
    #[test_case("otpauth://totp?enrollment%5Ftx%5Fid=ABC123", Some("ABC123") ; "percent encoded name")]
    #[test_case("otpauth://totp?enrollment_tx_id=%FF", None ; "invalid utf8 value")]
    #[test_case("otpauth://hotp?enrollment_tx_id=ABC123", None ; "hotp host")]
    #[test_case("https://totp?enrollment_tx_id=ABC123", None ; "https scheme")]
    #[test_case("OTPAUTH://totp?enrollment_tx_id=ABC123", None ; "scheme is exact")]
    #[test_case("otpauth://totp?secret=JBSWY3DPEHPK3PXP", None ; "missing parameter")]
    #[test_case("otpauth://totp", None ; "no query")]
    #[test_case("otpauth://totp?enrollment_tx_id", None ; "parameter without value")]
    #[test_case("otpauth://totp?enrollment_tx_id=", None ; "empty value")]
    #[test_case("not a uri", None ; "unparseable")]
    #[test_case("", None ; "empty input")]
    fn test_ticket_from_uri(uri: &str, expected: Option<&str>) {
        assert_eq!(ticket(uri).as_deref(), expected);
    }

    #[test]
    fn test_repeated_parameter_last_wins() {
        assert_eq!(
            ticket("otpauth://totp?enrollment_tx_id=AAA&enrollment_tx_id=BBB").as_deref(),
            Some("BBB")
        );
    }

    #[test]
    fn test_valueless_repeat_does_not_clear_earlier_value() {
        assert_eq!(
            ticket("otpauth://totp?enrollment_tx_id=AAA&enrollment_tx_id").as_deref(),
            Some("AAA")
        );
    }

    #[test]
    fn test_explicit_ticket_wins_over_uri() {
        let resolution = resolve_ticket(
            Some("explicit"),
            Some("otpauth://totp?enrollment_tx_id=from_uri"),
        );
        assert_eq!(
            resolution,
            TicketResolution::Resolved(EnrollmentTicket::new("explicit").unwrap())
        );
    }

    #[test]
    fn test_explicit_ticket_used_verbatim() {
        // looks like a URI without a ticket, still taken as-is
        let resolution = resolve_ticket(Some("otpauth://hotp?x=1"), None);
        assert_eq!(
            resolution,
            TicketResolution::Resolved(EnrollmentTicket::new("otpauth://hotp?x=1").unwrap())
        );
    }

    #[test]
    fn test_empty_explicit_ticket_does_not_fall_back_to_uri() {
        let resolution =
            resolve_ticket(Some(""), Some("otpauth://totp?enrollment_tx_id=from_uri"));
        assert_eq!(resolution, TicketResolution::Unresolved);
    }

    #[test]
    fn test_resolves_from_uri() {
        let resolution =
            resolve_ticket(None, Some("otpauth://totp?enrollment_tx_id=from_uri"));
        assert_eq!(
            resolution,
            TicketResolution::Resolved(EnrollmentTicket::new("from_uri").unwrap())
        );
    }

    #[test_case(None, None ; "nothing supplied")]
    #[test_case(None, Some("otpauth://hotp?enrollment_tx_id=ABC") ; "uri without ticket")]
    fn test_unresolved(ticket: Option<&str>, uri: Option<&str>) {
        assert_eq!(resolve_ticket(ticket, uri), TicketResolution::Unresolved);
    }

    #[test]
    fn test_ticket_debug_is_redacted() {
        let ticket = EnrollmentTicket::new("secret_ticket").unwrap();
        assert!(!format!("{ticket:?}").contains("secret_ticket"));
    }
}
