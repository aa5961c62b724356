//! Cheap connectivity probe distinguishing "past the portal" from captive.
//!
//! The probe must stay bounded and low-cost: it resolves a known public
//! host name with a short timeout instead of fetching anything over HTTP,
//! so it cannot itself trip the portal's redirect logic.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tracing::debug;

/// Default host resolved by the probe.
pub const DEFAULT_PROBE_HOST: &str = "www.google.com";

/// Default probe timeout in seconds.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 2;

/// Reachability check. `false` means "still captive or offline"; the probe
/// never raises.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Returns whether the host appears to have general internet access.
    async fn has_internet(&self) -> bool;
}

/// DNS-resolution probe against a known public host.
#[derive(Debug, Clone)]
pub struct DnsProbe {
    host: String,
    timeout: Duration,
}

impl DnsProbe {
    /// Creates a probe for `host` with the given timeout.
    #[must_use]
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROBE_HOST,
            Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        )
    }
}

#[async_trait]
impl Connectivity for DnsProbe {
    async fn has_internet(&self) -> bool {
        // lookup_host needs a port even though only resolution matters.
        let target = format!("{}:443", self.host);
        let resolved = tokio::time::timeout(self.timeout, lookup_host(target)).await;

        match resolved {
            Ok(Ok(mut addrs)) => {
                let reachable = addrs.next().is_some();
                debug!(host = %self.host, reachable, "connectivity probe resolved");
                reachable
            }
            Ok(Err(error)) => {
                debug!(host = %self.host, %error, "connectivity probe resolution failed");
                false
            }
            Err(_) => {
                debug!(
                    host = %self.host,
                    timeout_secs = self.timeout.as_secs(),
                    "connectivity probe timed out"
                );
                false
            }
        }
    }
}
