//! Enrollment of a device as a second factor.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use secrecy::SecretString;
use url::Url;

use crate::api::{ApiClient, EnrollmentPayload, ENROLL_PATH};
use crate::device::{DeviceIdentity, EnrolledDevice};
use crate::error::{GuardKitError, GuardKitResult};
use crate::hooks::Hooks;
use crate::keys::{SigningKey, VerificationKey};
use crate::request::{ApiRequest, Requestable};
use crate::ticket::{resolve_ticket, TicketResolution};

/// Inputs of an enrollment attempt.
///
/// At least one of `enrollment_ticket` or `enrollment_uri` must yield a ticket, otherwise the
/// enrollment fails with `GuardKitError::InvalidEnrollmentUri`. When both are given the ticket is
/// used and the URI ignored.
pub struct EnrollParams {
    /// Ticket, as given by the enrollment flow.
    pub enrollment_ticket: Option<String>,
    /// `otpauth://totp?enrollment_tx_id=…` URI, usually scanned from a QR code.
    pub enrollment_uri: Option<String>,
    /// Push notification token of the device.
    pub notification_token: String,
    /// How the device presents itself.
    pub device: DeviceIdentity,
    /// Public half of the device key pair, sent to the server.
    pub verification_key: Arc<dyn VerificationKey>,
    /// Private half of the device key pair, kept on the device.
    pub signing_key: Arc<dyn SigningKey>,
}

/// A request to enroll the device.
///
/// The ticket is resolved when the request is built. Nothing is sent until
/// [`Requestable::start`], which yields the [`EnrolledDevice`] on success.
pub struct EnrollRequest {
    state: EnrollState,
    notification_token: String,
    signing_key: Arc<dyn SigningKey>,
    hooks: Hooks,
}

enum EnrollState {
    Pending(ApiRequest<EnrollmentPayload>),
    /// No ticket could be resolved. Never sent, `url` is kept for descriptions only.
    Unresolved { url: Url },
}

impl EnrollRequest {
    /// Resolves the ticket and builds the enrollment call.
    #[must_use]
    pub fn new(api: &ApiClient, params: EnrollParams) -> Self {
        let EnrollParams {
            enrollment_ticket,
            enrollment_uri,
            notification_token,
            device,
            verification_key,
            signing_key,
        } = params;

        let state = match resolve_ticket(enrollment_ticket.as_deref(), enrollment_uri.as_deref())
        {
            TicketResolution::Resolved(ticket) => EnrollState::Pending(api.enroll(
                &ticket,
                &device,
                &notification_token,
                verification_key.as_ref(),
            )),
            TicketResolution::Unresolved => EnrollState::Unresolved {
                url: api.config().endpoint(ENROLL_PATH),
            },
        };

        Self {
            state,
            notification_token,
            signing_key,
            hooks: Hooks::default(),
        }
    }

    /// Whether a ticket was resolved. When `false`, `start` fails without network activity.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.state, EnrollState::Pending(_))
    }

    async fn execute(self) -> GuardKitResult<EnrolledDevice> {
        let request = match self.state {
            EnrollState::Pending(request) => request,
            EnrollState::Unresolved { .. } => return Err(GuardKitError::InvalidEnrollmentUri),
        };

        let payload = request.on(self.hooks).start().await?;

        Ok(EnrolledDevice::new(
            payload.id,
            payload.user_id,
            SecretString::from(payload.token),
            self.notification_token,
            self.signing_key,
            payload.totp,
        ))
    }
}

impl Requestable for EnrollRequest {
    type Output = EnrolledDevice;

    fn on(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    fn start(self) -> impl Future<Output = GuardKitResult<EnrolledDevice>> + Send {
        self.execute()
    }
}

impl fmt::Display for EnrollRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            EnrollState::Pending(request) => fmt::Display::fmt(request, f),
            EnrollState::Unresolved { url } => write!(f, "POST {url}"),
        }
    }
}

impl fmt::Debug for EnrollRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            EnrollState::Pending(request) => f
                .debug_struct("EnrollRequest")
                .field("request", request)
                .field("hooks", &self.hooks)
                .finish(),
            EnrollState::Unresolved { url } => f
                .debug_struct("EnrollRequest")
                .field("url", &url.as_str())
                .field("error", &GuardKitError::InvalidEnrollmentUri)
                .finish(),
        }
    }
}
