//! The per-invocation decision state machine.
//!
//! One invocation performs exactly one decision and exits; repetition is
//! delegated to an external scheduler or interface-event watcher. The
//! whole decision-and-login sequence runs under the host-wide run lock,
//! and a second invocation finding the lock held skips immediately rather
//! than queuing a duplicate login attempt.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::journal::Journal;
use crate::portal::{LoginOutcome, PortalLogin};
use crate::probe::Connectivity;
use crate::state::{AuthRecord, AuthStatus, RunLock, StateStore, unix_now};

/// The action selected for this invocation.
///
/// Derived once per run from `(status, session expiry, connectivity)` by
/// [`decide`] — the transition table made explicit so every branch is
/// enumerable and testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Authenticated, session valid, internet reachable: log and exit.
    Skip,
    /// Drive the portal login protocol.
    Login,
    /// Internet is reachable without a valid record: adopt the session as
    /// authenticated without touching the portal.
    MarkAuthenticated,
}

/// Selects the action for one invocation.
///
/// | status          | expired | internet | action              |
/// |-----------------|---------|----------|---------------------|
/// | Authenticated   | false   | yes      | `Skip`              |
/// | Authenticated   | false   | no       | `Login`             |
/// | Authenticated   | true    | any      | `Login`             |
/// | Unknown/Failed  | —       | no       | `Login`             |
/// | Unknown/Failed  | —       | yes      | `MarkAuthenticated` |
///
/// `force_login` overrides the table entirely — the explicit re-auth
/// escape hatch exposed on the CLI.
#[must_use]
pub fn decide(
    status: AuthStatus,
    session_expired: bool,
    has_internet: bool,
    force_login: bool,
) -> Action {
    if force_login {
        return Action::Login;
    }

    match status {
        AuthStatus::Authenticated if !session_expired => {
            if has_internet {
                Action::Skip
            } else {
                Action::Login
            }
        }
        AuthStatus::Authenticated => Action::Login,
        AuthStatus::Unknown | AuthStatus::Failed => {
            if has_internet {
                Action::MarkAuthenticated
            } else {
                Action::Login
            }
        }
    }
}

/// Outcome of one completed (or skipped) decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another invocation held the run lock; nothing was done.
    Skipped,
    /// Authenticated with a valid session and working internet.
    NoActionNeeded,
    /// Internet worked without a login; record adopted as authenticated.
    MarkedAuthenticated,
    /// The portal login attempt succeeded.
    LoginSucceeded,
    /// The portal login attempt failed; diagnostic persisted.
    LoginFailed,
}

/// Combines the persisted record, connectivity probe and portal session
/// into one decision per invocation.
///
/// The portal is optional: branches that never touch the portal
/// (`Skip`, `MarkAuthenticated`) must complete without credentials, so
/// a missing login backend only becomes fatal once `decide` selects
/// [`Action::Login`].
pub struct Orchestrator {
    store: StateStore,
    journal: Journal,
    probe: Arc<dyn Connectivity>,
    portal: Option<Arc<dyn PortalLogin>>,
    session_duration_secs: u64,
    force_login: bool,
}

impl Orchestrator {
    /// Creates an orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        store: StateStore,
        journal: Journal,
        probe: Arc<dyn Connectivity>,
        portal: Option<Arc<dyn PortalLogin>>,
        session_duration_secs: u64,
    ) -> Self {
        Self {
            store,
            journal,
            probe,
            portal,
            session_duration_secs,
            force_login: false,
        }
    }

    /// Forces a portal login on this run regardless of the decision table.
    #[must_use]
    pub fn with_force_login(mut self, force_login: bool) -> Self {
        self.force_login = force_login;
        self
    }

    /// Runs one decision cycle: acquire the run lock, load the record,
    /// branch on `(status, expiry, connectivity)`, act, persist, exit.
    ///
    /// Lock contention is not an error here — it yields
    /// [`RunOutcome::Skipped`] with the state record untouched. Fatal
    /// setup failures (unusable lock file, unwritable state dir) do
    /// propagate.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock file cannot be set up, a login is
    /// required but no portal backend was configured, or the record
    /// cannot be persisted after a completed decision branch.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        let lock = match RunLock::try_acquire(self.store.lock_path()) {
            Ok(lock) => lock,
            Err(error) if error.is_contention() => {
                info!("run lock held by another invocation; skipping this cycle");
                self.journal
                    .append("skipped: another invocation holds the run lock");
                return Ok(RunOutcome::Skipped);
            }
            Err(error) => return Err(error).context("failed to set up the run lock"),
        };

        self.journal.append("run start");

        let record = self.store.load();
        let now = unix_now();
        let session_expired = record.session_expired(now, self.session_duration_secs);

        // The probe result is irrelevant when expiry or --force-login
        // already mandates a login, so don't pay for it. `None` means the
        // probe never ran, and the journal says so rather than reporting
        // a failed probe that never happened.
        let needs_probe = !self.force_login
            && !(record.status == AuthStatus::Authenticated && session_expired);
        let probed = if needs_probe {
            Some(self.probe.has_internet().await)
        } else {
            None
        };
        let has_internet = probed.unwrap_or(false);

        let action = decide(
            record.status,
            session_expired,
            has_internet,
            self.force_login,
        );
        info!(
            status = record.status.as_str(),
            session_expired,
            internet = ?probed,
            force_login = self.force_login,
            ?action,
            "decision made"
        );
        self.journal.append(&format!(
            "state: status={} expired={} internet={} -> {:?}",
            record.status.as_str(),
            session_expired,
            match probed {
                Some(true) => "yes",
                Some(false) => "no",
                None => "not-probed",
            },
            action
        ));

        let outcome = match action {
            Action::Skip => {
                self.journal
                    .append("already authenticated with working internet; nothing to do");
                RunOutcome::NoActionNeeded
            }
            Action::MarkAuthenticated => {
                let updated = AuthRecord {
                    status: AuthStatus::Authenticated,
                    last_success_epoch: unix_now(),
                };
                self.store
                    .save(&updated)
                    .context("failed to persist auth record")?;
                self.journal
                    .append("internet reachable without login; marked authenticated");
                RunOutcome::MarkedAuthenticated
            }
            Action::Login => {
                let Some(portal) = self.portal.as_deref() else {
                    self.journal
                        .append("login required but no credentials are configured");
                    bail!(
                        "no portal credentials configured; set `username` and `password` in the config file"
                    );
                };
                self.run_login(portal, &record).await?
            }
        };

        self.journal.append("run end");
        drop(lock);
        Ok(outcome)
    }

    async fn run_login(&self, portal: &dyn PortalLogin, prior: &AuthRecord) -> Result<RunOutcome> {
        self.journal.append("attempting portal login");

        match portal.login().await {
            LoginOutcome::Success { artifacts } => {
                let updated = AuthRecord {
                    status: AuthStatus::Authenticated,
                    last_success_epoch: unix_now(),
                };
                self.store
                    .save(&updated)
                    .context("failed to persist auth record")?;
                info!(redirect_url = %artifacts.redirect_url, "portal login succeeded");
                self.journal.append("portal login succeeded");
                Ok(RunOutcome::LoginSucceeded)
            }
            LoginOutcome::Failure {
                error,
                diagnostic_body,
            } => {
                // Failure keeps the prior last-success timestamp.
                let updated = AuthRecord {
                    status: AuthStatus::Failed,
                    last_success_epoch: prior.last_success_epoch,
                };
                self.store
                    .save(&updated)
                    .context("failed to persist auth record")?;

                if let Some(body) = diagnostic_body.as_deref() {
                    if let Err(io_error) = self.store.save_failure_diagnostic(body) {
                        warn!(%io_error, "failed to persist login failure diagnostic");
                    }
                }

                warn!(%error, "portal login failed");
                self.journal
                    .append(&format!("portal login failed: {error}"));
                Ok(RunOutcome::LoginFailed)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::portal::PortalError;

    struct FixedConnectivity(bool);

    #[async_trait]
    impl Connectivity for FixedConnectivity {
        async fn has_internet(&self) -> bool {
            self.0
        }
    }

    /// Counts login calls and replays a canned outcome.
    struct ScriptedPortal {
        calls: AtomicUsize,
        succeed: bool,
        diagnostic: Option<String>,
    }

    impl ScriptedPortal {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                succeed: true,
                diagnostic: None,
            }
        }

        fn failing(diagnostic: Option<&str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                succeed: false,
                diagnostic: diagnostic.map(ToString::to_string),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PortalLogin for ScriptedPortal {
        async fn login(&self) -> LoginOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                LoginOutcome::Success {
                    artifacts: crate::portal::SessionArtifacts::new(
                        "https://gw/fgtauth?00ff",
                        Some("00ff".to_string()),
                        "APSCOOKIE=test",
                        "00ff",
                        "http://example.com/",
                    ),
                }
            } else {
                LoginOutcome::Failure {
                    error: PortalError::MissingRedirect,
                    diagnostic_body: self.diagnostic.clone(),
                }
            }
        }
    }

    fn orchestrator(
        temp: &TempDir,
        internet: bool,
        portal: Arc<ScriptedPortal>,
        session_duration_secs: u64,
    ) -> Orchestrator {
        let store = StateStore::open(temp.path()).unwrap();
        let journal = Journal::new(store.journal_path());
        Orchestrator::new(
            store,
            journal,
            Arc::new(FixedConnectivity(internet)),
            Some(portal),
            session_duration_secs,
        )
    }

    fn orchestrator_without_portal(temp: &TempDir, internet: bool) -> Orchestrator {
        let store = StateStore::open(temp.path()).unwrap();
        let journal = Journal::new(store.journal_path());
        Orchestrator::new(
            store,
            journal,
            Arc::new(FixedConnectivity(internet)),
            None,
            43_200,
        )
    }

    fn seed(temp: &TempDir, status: AuthStatus, last_success: u64) {
        let store = StateStore::open(temp.path()).unwrap();
        store
            .save(&AuthRecord {
                status,
                last_success_epoch: last_success,
            })
            .unwrap();
    }

    // ---- decide(): the full transition table ----

    #[test]
    fn test_decide_authenticated_valid_with_internet_skips() {
        assert_eq!(
            decide(AuthStatus::Authenticated, false, true, false),
            Action::Skip
        );
    }

    #[test]
    fn test_decide_authenticated_valid_without_internet_logs_in() {
        assert_eq!(
            decide(AuthStatus::Authenticated, false, false, false),
            Action::Login
        );
    }

    #[test]
    fn test_decide_authenticated_expired_logs_in_regardless_of_internet() {
        assert_eq!(
            decide(AuthStatus::Authenticated, true, true, false),
            Action::Login
        );
        assert_eq!(
            decide(AuthStatus::Authenticated, true, false, false),
            Action::Login
        );
    }

    #[test]
    fn test_decide_unknown_or_failed_without_internet_logs_in() {
        for status in [AuthStatus::Unknown, AuthStatus::Failed] {
            for expired in [true, false] {
                assert_eq!(decide(status, expired, false, false), Action::Login);
            }
        }
    }

    #[test]
    fn test_decide_unknown_or_failed_with_internet_marks_authenticated() {
        for status in [AuthStatus::Unknown, AuthStatus::Failed] {
            for expired in [true, false] {
                assert_eq!(
                    decide(status, expired, true, false),
                    Action::MarkAuthenticated
                );
            }
        }
    }

    #[test]
    fn test_decide_force_login_overrides_everything() {
        assert_eq!(
            decide(AuthStatus::Authenticated, false, true, true),
            Action::Login
        );
        assert_eq!(decide(AuthStatus::Unknown, false, true, true), Action::Login);
    }

    // ---- run_once(): spec scenarios ----

    #[tokio::test]
    async fn test_unknown_record_with_internet_marks_authenticated_without_login() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Unknown, 0);
        let portal = Arc::new(ScriptedPortal::succeeding());

        let outcome = orchestrator(&temp, true, portal.clone(), 43_200)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::MarkedAuthenticated);
        assert_eq!(portal.calls(), 0, "no login HTTP calls may be made");

        let record = StateStore::open(temp.path()).unwrap().load();
        assert_eq!(record.status, AuthStatus::Authenticated);
        assert!(record.last_success_epoch > 0);
    }

    #[tokio::test]
    async fn test_expired_session_attempts_login_even_with_internet() {
        let temp = TempDir::new().unwrap();
        seed(
            &temp,
            AuthStatus::Authenticated,
            unix_now().saturating_sub(50_000),
        );
        let portal = Arc::new(ScriptedPortal::succeeding());

        let outcome = orchestrator(&temp, true, portal.clone(), 43_200)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::LoginSucceeded);
        assert_eq!(portal.calls(), 1);
    }

    #[tokio::test]
    async fn test_valid_session_with_internet_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let recent = unix_now().saturating_sub(10);
        seed(&temp, AuthStatus::Authenticated, recent);
        let portal = Arc::new(ScriptedPortal::succeeding());

        let outcome = orchestrator(&temp, true, portal.clone(), 43_200)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::NoActionNeeded);
        assert_eq!(portal.calls(), 0);

        let record = StateStore::open(temp.path()).unwrap().load();
        assert_eq!(record.last_success_epoch, recent, "record must be untouched");
    }

    #[tokio::test]
    async fn test_valid_session_without_internet_reauthenticates() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Authenticated, unix_now());
        let portal = Arc::new(ScriptedPortal::succeeding());

        let outcome = orchestrator(&temp, false, portal.clone(), 43_200)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::LoginSucceeded);
        assert_eq!(portal.calls(), 1);
    }

    #[tokio::test]
    async fn test_login_failure_sets_failed_and_keeps_last_success() {
        let temp = TempDir::new().unwrap();
        let prior_success = unix_now().saturating_sub(60_000);
        seed(&temp, AuthStatus::Authenticated, prior_success);
        let portal = Arc::new(ScriptedPortal::failing(Some("<html>no redirect</html>")));

        let outcome = orchestrator(&temp, false, portal, 43_200)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::LoginFailed);

        let store = StateStore::open(temp.path()).unwrap();
        let record = store.load();
        assert_eq!(record.status, AuthStatus::Failed);
        assert_eq!(
            record.last_success_epoch, prior_success,
            "failure must not move last_success"
        );

        let diagnostic =
            std::fs::read_to_string(store.failure_diagnostic_path()).unwrap();
        assert_eq!(diagnostic, "<html>no redirect</html>");
    }

    #[tokio::test]
    async fn test_repeated_success_is_idempotent_with_monotonic_timestamp() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Unknown, 0);
        let portal = Arc::new(ScriptedPortal::succeeding());

        let orch = orchestrator(&temp, false, portal.clone(), 43_200);
        assert_eq!(orch.run_once().await.unwrap(), RunOutcome::LoginSucceeded);
        let first = StateStore::open(temp.path()).unwrap().load();

        let orch = orchestrator(&temp, false, portal, 43_200).with_force_login(true);
        assert_eq!(orch.run_once().await.unwrap(), RunOutcome::LoginSucceeded);
        let second = StateStore::open(temp.path()).unwrap().load();

        assert_eq!(first.status, AuthStatus::Authenticated);
        assert_eq!(second.status, AuthStatus::Authenticated);
        assert!(second.last_success_epoch >= first.last_success_epoch);
    }

    #[tokio::test]
    async fn test_contended_lock_skips_without_touching_state() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Failed, 123);
        let store = StateStore::open(temp.path()).unwrap();
        let held = RunLock::try_acquire(store.lock_path()).unwrap();

        let portal = Arc::new(ScriptedPortal::succeeding());
        let outcome = orchestrator(&temp, true, portal.clone(), 43_200)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Skipped);
        assert_eq!(portal.calls(), 0);

        let record = store.load();
        assert_eq!(record.status, AuthStatus::Failed);
        assert_eq!(record.last_success_epoch, 123);
        drop(held);
    }

    #[tokio::test]
    async fn test_mark_authenticated_completes_without_credentials() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Unknown, 0);

        let outcome = orchestrator_without_portal(&temp, true)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::MarkedAuthenticated);
        let record = StateStore::open(temp.path()).unwrap().load();
        assert_eq!(record.status, AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_login_without_credentials_is_fatal() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Unknown, 0);

        let error = orchestrator_without_portal(&temp, false)
            .run_once()
            .await
            .unwrap_err();
        assert!(
            error.to_string().contains("no portal credentials configured"),
            "got: {error:#}"
        );

        // The decision never completed; the record stays as seeded.
        let record = StateStore::open(temp.path()).unwrap().load();
        assert_eq!(record.status, AuthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_journal_reports_skipped_probe_as_not_probed() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Authenticated, unix_now());
        let portal = Arc::new(ScriptedPortal::succeeding());

        orchestrator(&temp, true, portal, 43_200)
            .with_force_login(true)
            .run_once()
            .await
            .unwrap();

        let store = StateStore::open(temp.path()).unwrap();
        let journal = std::fs::read_to_string(store.journal_path()).unwrap();
        assert!(
            journal.contains("internet=not-probed"),
            "journal must not claim a probe result it never obtained: {journal}"
        );
    }

    #[tokio::test]
    async fn test_force_login_bypasses_probe_and_valid_session() {
        let temp = TempDir::new().unwrap();
        seed(&temp, AuthStatus::Authenticated, unix_now());
        let portal = Arc::new(ScriptedPortal::succeeding());

        let outcome = orchestrator(&temp, true, portal.clone(), 43_200)
            .with_force_login(true)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::LoginSucceeded);
        assert_eq!(portal.calls(), 1);
    }
}
