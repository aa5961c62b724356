//! Shared HTTP client construction policy for the portal session.
//!
//! This module centralizes portal networking defaults so every protocol
//! step stays consistent on timeout, user-agent, compression, cookie
//! context, and redirect handling. Redirect following is disabled: the
//! gateway's bounce is a client-side directive in the body, and an HTTP
//! 3xx from the portal must stay visible to the protocol handler rather
//! than be chased by the client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;

/// Connect timeout applied to every portal request.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Builds the shared portal user-agent string.
#[must_use]
pub fn portal_user_agent() -> String {
    format!(
        "portalguard/{} (captive-portal-login)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Builds the portal HTTP client around a shared cookie jar.
///
/// All protocol steps reuse one client so the session cookie captured in
/// step 2 is automatically presented on later requests. Proxies are
/// disabled: the portal is by definition reachable only on the local
/// segment, and a configured proxy would route around it.
///
/// # Errors
///
/// Returns the underlying `reqwest` error when client construction fails.
pub fn build_portal_client(cookie_jar: Arc<Jar>) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(portal_user_agent())
        .gzip(true)
        .redirect(Policy::none())
        .no_proxy()
        .cookie_provider(cookie_jar)
        .build()
}
