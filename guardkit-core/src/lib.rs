#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! `guardkit-core` enrolls a device as a push-notification second factor.
//!
//! ```rust,ignore
//! let api = ApiClient::new(ClientConfig::for_domain("tenant.guardian.example.com")?);
//! let request = EnrollRequest::new(&api, EnrollParams {
//!     enrollment_ticket: None,
//!     enrollment_uri: Some(scanned_qr_code),
//!     notification_token: push_token,
//!     device: DeviceIdentity::generate("My Phone"),
//!     verification_key: public_key,
//!     signing_key: private_key,
//! });
//! let device = request.on(Hooks::logging()).start().await?;
//! ```

mod api;
pub use api::*;

mod config;
pub use config::*;

mod device;
pub use device::*;

mod enroll;
pub use enroll::*;

mod error;
pub use error::*;

mod ffi;
pub use ffi::*;

mod hooks;
pub use hooks::*;

mod keys;
pub use keys::*;

mod request;
pub use request::*;

mod ticket;
pub use ticket::*;

/// Bridge from the `log` facade to a host-provided logger.
pub mod logger;

// private modules
mod http_request;

uniffi::setup_scaffolding!("guardkit_core");
