//! Pattern extraction steps for the portal login protocol.
//!
//! The portal's markup is not under our control, so each step is a small
//! named extraction with an explicit input and failure signal, kept
//! independently testable against fixed sample bodies. The patterns target
//! one known gateway family; markup that deviates yields `None` and the
//! caller aborts the attempt.

use std::sync::LazyLock;

use regex::Regex;

/// Marker segment preceding the hex auth token in the redirect URL
/// (`http://gateway:1000/fgtauth?0fe80a1b2c3d4e5f`).
pub const AUTH_TOKEN_MARKER: &str = "fgtauth";

/// Hidden form field carrying the portal's one-time login magic.
pub const MAGIC_FIELD: &str = "magic";

/// Hidden form field carrying the post-login redirect target.
pub const REDIR_FIELD: &str = "4Tredir";

/// `window.location="…"` script injection used by the gateway to bounce
/// intercepted HTTP fetches to the login page.
#[allow(clippy::expect_used)]
static SCRIPT_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.location\s*=\s*["']([^"']+)["']"#).expect("redirect regex is valid")
});

/// `<meta http-equiv="refresh" content="0; url=…">` fallback some firmware
/// revisions emit instead of the script injection.
#[allow(clippy::expect_used)]
static META_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)http-equiv=["']?refresh["']?[^>]*url=([^"'>\s]+)"#)
        .expect("meta refresh regex is valid")
});

/// Hex token following the auth marker segment in the redirect URL.
#[allow(clippy::expect_used)]
static AUTH_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{AUTH_TOKEN_MARKER}\?([0-9a-fA-F]+)")).expect("token regex is valid")
});

/// Extracts the client-side redirect target from a probe response body.
///
/// Matches the gateway's script injection first, then the meta-refresh
/// fallback. Returns `None` when the body carries neither — a hard failure
/// for the attempt.
#[must_use]
pub fn redirect_url(body: &str) -> Option<String> {
    if let Some(captures) = SCRIPT_REDIRECT.captures(body) {
        return Some(captures[1].to_string());
    }
    META_REDIRECT
        .captures(body)
        .map(|captures| captures[1].to_string())
}

/// Extracts the hex auth token following the known marker segment in the
/// redirect URL.
///
/// The token is never consumed by the final login request; a missing token
/// is informational, not fatal (see DESIGN.md).
#[must_use]
pub fn auth_token(redirect_url: &str) -> Option<String> {
    AUTH_TOKEN
        .captures(redirect_url)
        .map(|captures| captures[1].to_ascii_lowercase())
}

/// Extracts the value of a hidden `<input>` field by name from login-page
/// HTML. Attribute order within the tag is not assumed.
#[must_use]
pub fn hidden_field(body: &str, name: &str) -> Option<String> {
    #[allow(clippy::expect_used)]
    let pattern = Regex::new(&format!(
        r#"(?i)<input[^>]*\bname=["']?{}["']?[^>]*\bvalue=["']([^"']*)["']"#,
        regex::escape(name)
    ))
    .expect("field regex is valid");

    if let Some(captures) = pattern.captures(body) {
        return Some(captures[1].to_string());
    }

    // value= preceding name= within the same tag.
    #[allow(clippy::expect_used)]
    let reversed = Regex::new(&format!(
        r#"(?i)<input[^>]*\bvalue=["']([^"']*)["'][^>]*\bname=["']?{}["']?"#,
        regex::escape(name)
    ))
    .expect("field regex is valid");
    reversed
        .captures(body)
        .map(|captures| captures[1].to_string())
}
