//! Error types for the portal login protocol.
//!
//! Every variant is a step-level abort: the session converts transient
//! network failures and missing-pattern extractions into a final Failure
//! for the whole attempt, never a process crash. Retries happen only via
//! the next externally-triggered invocation.

use thiserror::Error;

/// Errors that can occur during one portal login attempt.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Network-level error (DNS resolution, connection refused, TLS, etc.)
    /// at a named protocol step.
    #[error("network error during {step}: {source}")]
    Network {
        /// The protocol step that failed.
        step: &'static str,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// A step exceeded its bounded timeout.
    #[error("timeout during {step}")]
    Timeout {
        /// The protocol step that timed out.
        step: &'static str,
    },

    /// The probe response body carried no client-side redirect directive —
    /// either there is no portal in the path or it speaks a different
    /// pattern than the one this tool targets.
    #[error("no client-side redirect directive found in probe response")]
    MissingRedirect,

    /// The portal issued no session cookie on the redirect target.
    #[error("portal response carried no session cookie")]
    MissingCookie,

    /// An expected hidden form field was absent from the login page.
    #[error("login page is missing hidden form field `{field}`")]
    MissingFormField {
        /// The hidden field name that could not be extracted.
        field: &'static str,
    },

    /// The final response contained none of the success keywords.
    #[error("portal did not acknowledge the login")]
    LoginRejected,
}

impl PortalError {
    /// Creates a network error for a named step, promoting reqwest timeouts
    /// to the dedicated [`PortalError::Timeout`] variant.
    pub fn network(step: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { step }
        } else {
            Self::Network { step, source }
        }
    }

    /// Creates a missing-form-field error.
    #[must_use]
    pub fn missing_form_field(field: &'static str) -> Self {
        Self::MissingFormField { field }
    }
}

// No blanket `From<reqwest::Error>`: variants require the step name the
// source error cannot provide, so the constructor helpers carry context.
