//! The portal login protocol: one authentication attempt end-to-end.
//!
//! The sequence is strict — each step's extraction is a precondition for
//! the next, any failure aborts the whole attempt, and there is no retry
//! within one invocation. All steps share one cookie context so the
//! session cookie captured from the redirect target is presented on the
//! login-page fetch and the credential POST automatically.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::SET_COOKIE;
use tracing::{debug, info, instrument, warn};

use crate::config::Credentials;

use super::client::build_portal_client;
use super::error::PortalError;
use super::extract;

/// Bounded timeout for the probe fetch, cookie capture, and login-page
/// fetch steps.
const STEP_TIMEOUT_SECS: u64 = 5;

/// Bounded timeout for the credential POST.
const SUBMIT_TIMEOUT_SECS: u64 = 10;

/// Literal submit marker the gateway's form expects.
const SUBMIT_VALUE: &str = "Continue";

/// Keywords whose case-insensitive presence in the final response body
/// marks the login as acknowledged.
///
/// Inherited classifier — fragile against portal copy changes, preserved
/// as-is so behavior stays regression-equivalent (see DESIGN.md).
pub const SUCCESS_KEYWORDS: &[&str] = &["success", "welcome", "logout"];

/// Returns whether the final response body acknowledges the login.
#[must_use]
pub fn login_acknowledged(body: &str) -> bool {
    let lowered = body.to_lowercase();
    SUCCESS_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Values derived sequentially during one login attempt. Transient: none
/// of these persist beyond the run.
#[derive(Clone)]
pub struct SessionArtifacts {
    /// Login page URL extracted from the probe response.
    pub redirect_url: String,
    /// Hex token from the redirect URL's query. Informational only; a
    /// missing token does not fail the attempt.
    pub auth_token: Option<String>,
    /// Session cookie issued by the portal (sensitive — never log).
    session_cookie: String,
    /// Hidden `magic` form value from the login page.
    pub form_magic: String,
    /// Hidden `4Tredir` form value from the login page.
    pub form_redirect: String,
}

impl SessionArtifacts {
    /// Creates an artifact set. Primarily useful for constructing
    /// [`LoginOutcome::Success`] from test doubles of [`PortalLogin`].
    #[must_use]
    pub fn new(
        redirect_url: impl Into<String>,
        auth_token: Option<String>,
        session_cookie: impl Into<String>,
        form_magic: impl Into<String>,
        form_redirect: impl Into<String>,
    ) -> Self {
        Self {
            redirect_url: redirect_url.into(),
            auth_token,
            session_cookie: session_cookie.into(),
            form_magic: form_magic.into(),
            form_redirect: form_redirect.into(),
        }
    }

    /// Returns the captured session cookie.
    ///
    /// Cookie values are sensitive — avoid logging the return value.
    #[must_use]
    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for SessionArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionArtifacts")
            .field("redirect_url", &self.redirect_url)
            .field("auth_token", &self.auth_token)
            .field("session_cookie", &"[REDACTED]")
            .field("form_magic", &self.form_magic)
            .field("form_redirect", &self.form_redirect)
            .finish()
    }
}

/// Result of one login attempt.
#[derive(Debug)]
pub enum LoginOutcome {
    /// The portal acknowledged the login.
    Success {
        /// Artifacts derived during the attempt.
        artifacts: SessionArtifacts,
    },
    /// The attempt aborted at some step.
    Failure {
        /// The step-level error.
        error: PortalError,
        /// Raw response body retained for diagnosis when one was in hand.
        diagnostic_body: Option<String>,
    },
}

impl LoginOutcome {
    /// Whether the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One end-to-end portal authentication attempt.
#[async_trait]
pub trait PortalLogin: Send + Sync {
    /// Runs the login sequence once. Never returns `Err`: every failure is
    /// folded into [`LoginOutcome::Failure`].
    async fn login(&self) -> LoginOutcome;
}

/// Stateful HTTP client sequence implementing the login protocol against
/// the gateway's known redirect/login pattern.
#[derive(Debug, Clone)]
pub struct PortalSession {
    client: Client,
    probe_url: String,
    credentials: Credentials,
}

impl PortalSession {
    /// Creates a session for one login attempt against `probe_url`.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error when the HTTP client cannot
    /// be constructed.
    pub fn new(
        probe_url: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, reqwest::Error> {
        let jar = Arc::new(Jar::default());
        let client = build_portal_client(jar)?;
        Ok(Self {
            client,
            probe_url: probe_url.into(),
            credentials,
        })
    }

    /// Step 1: fetch the probe URL and extract the client-side redirect.
    async fn discover_redirect(&self) -> Result<String, (PortalError, Option<String>)> {
        const STEP: &str = "portal probe";

        let response = self
            .client
            .get(&self.probe_url)
            .timeout(Duration::from_secs(STEP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| (PortalError::network(STEP, e), None))?;

        let body = response
            .text()
            .await
            .map_err(|e| (PortalError::network(STEP, e), None))?;

        match extract::redirect_url(&body) {
            Some(url) => {
                debug!(redirect_url = %url, "portal redirect discovered");
                Ok(url)
            }
            None => Err((PortalError::MissingRedirect, Some(body))),
        }
    }

    /// Step 2: header-only request to the redirect target to capture the
    /// portal session cookie.
    async fn capture_cookie(
        &self,
        redirect_url: &str,
    ) -> Result<String, (PortalError, Option<String>)> {
        const STEP: &str = "cookie capture";

        let response = self
            .client
            .head(redirect_url)
            .timeout(Duration::from_secs(STEP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| (PortalError::network(STEP, e), None))?;

        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .find(|pair| !pair.is_empty())
            .map(ToString::to_string);

        // The shared jar has already stored the cookie for later steps;
        // the explicit capture is the precondition check plus artifact.
        cookie.ok_or((PortalError::MissingCookie, None))
    }

    /// Step 4: fetch the login page (cookie presented from the jar) and
    /// extract the two hidden form values.
    async fn fetch_form_fields(
        &self,
        redirect_url: &str,
    ) -> Result<(String, String), (PortalError, Option<String>)> {
        const STEP: &str = "login page fetch";

        let response = self
            .client
            .get(redirect_url)
            .timeout(Duration::from_secs(STEP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| (PortalError::network(STEP, e), None))?;

        let body = response
            .text()
            .await
            .map_err(|e| (PortalError::network(STEP, e), None))?;

        let Some(magic) = extract::hidden_field(&body, extract::MAGIC_FIELD) else {
            return Err((
                PortalError::missing_form_field(extract::MAGIC_FIELD),
                Some(body),
            ));
        };
        let Some(redir) = extract::hidden_field(&body, extract::REDIR_FIELD) else {
            return Err((
                PortalError::missing_form_field(extract::REDIR_FIELD),
                Some(body),
            ));
        };

        Ok((magic, redir))
    }

    /// Steps 5–6: submit the credential POST and classify the response.
    async fn submit_credentials(
        &self,
        redirect_url: &str,
        magic: &str,
        redir: &str,
    ) -> Result<(), (PortalError, Option<String>)> {
        const STEP: &str = "login POST";

        let form = [
            ("username", self.credentials.username()),
            ("password", self.credentials.password()),
            (extract::MAGIC_FIELD, magic),
            (extract::REDIR_FIELD, redir),
            ("submit", SUBMIT_VALUE),
        ];

        let response = self
            .client
            .post(redirect_url)
            .timeout(Duration::from_secs(SUBMIT_TIMEOUT_SECS))
            .form(&form)
            .send()
            .await
            .map_err(|e| (PortalError::network(STEP, e), None))?;

        let body = response
            .text()
            .await
            .map_err(|e| (PortalError::network(STEP, e), None))?;

        if login_acknowledged(&body) {
            Ok(())
        } else {
            Err((PortalError::LoginRejected, Some(body)))
        }
    }

    async fn attempt(&self) -> Result<SessionArtifacts, (PortalError, Option<String>)> {
        let redirect_url = self.discover_redirect().await?;
        let session_cookie = self.capture_cookie(&redirect_url).await?;

        // Step 3: informational only; the final request never consumes it.
        let auth_token = extract::auth_token(&redirect_url);
        if auth_token.is_none() {
            warn!(redirect_url = %redirect_url, "no auth token in redirect URL; continuing");
        }

        let (form_magic, form_redirect) = self.fetch_form_fields(&redirect_url).await?;
        self.submit_credentials(&redirect_url, &form_magic, &form_redirect)
            .await?;

        Ok(SessionArtifacts {
            redirect_url,
            auth_token,
            session_cookie,
            form_magic,
            form_redirect,
        })
    }
}

#[async_trait]
impl PortalLogin for PortalSession {
    #[instrument(skip(self), fields(probe_url = %self.probe_url))]
    async fn login(&self) -> LoginOutcome {
        match self.attempt().await {
            Ok(artifacts) => {
                info!("portal login acknowledged");
                LoginOutcome::Success { artifacts }
            }
            Err((error, diagnostic_body)) => {
                warn!(%error, "portal login failed");
                LoginOutcome::Failure {
                    error,
                    diagnostic_body,
                }
            }
        }
    }
}
