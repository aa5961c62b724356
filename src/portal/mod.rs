//! The portal login protocol handler.
//!
//! Targets one known gateway redirect/login pattern: a client-side
//! redirect injected into intercepted HTTP fetches, a cookie-issuing
//! login page with `magic`/`4Tredir` hidden fields, and a credential POST
//! acknowledged by a fixed keyword set. Deviations from this pattern are
//! failures, not a pluggable strategy system.

pub mod client;
pub mod error;
pub mod extract;
pub mod session;

pub use client::{build_portal_client, portal_user_agent};
pub use error::PortalError;
pub use session::{
    LoginOutcome, PortalLogin, PortalSession, SUCCESS_KEYWORDS, SessionArtifacts,
    login_acknowledged,
};
