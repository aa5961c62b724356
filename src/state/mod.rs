//! Persisted authentication record and the host-wide run lock.
//!
//! The record is the sole source of truth across invocations: nothing in
//! memory survives between runs. It is stored as two plain files under the
//! state directory (`status` and `last_success`), read and written only
//! while the run lock is held, so no storage-level atomicity is needed.

pub mod lock;

pub use lock::{LockError, RunLock};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::config::env_var_non_empty_os;

/// File names inside the state directory.
const STATUS_FILE: &str = "status";
const LAST_SUCCESS_FILE: &str = "last_success";
const FAILURE_FILE: &str = "last_failure.html";
const LOG_FILE: &str = "portalguard.log";
const LOCK_FILE: &str = "run.lock";

/// Authentication status of the host as of the last completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No run has decided anything yet (or the record was unreadable).
    Unknown,
    /// The last decision left the host past the portal.
    Authenticated,
    /// The last login attempt failed; see the failure diagnostic.
    Failed,
}

impl AuthStatus {
    /// Returns the stable on-disk label for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        }
    }

    /// Parses an on-disk label. Unrecognized content yields `None` so the
    /// caller can fall back to a safe default.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "unknown" => Some(Self::Unknown),
            "authenticated" => Some(Self::Authenticated),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// The single persisted authentication record for this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRecord {
    /// Status as of the last completed decision.
    pub status: AuthStatus,
    /// Unix seconds of the most recent successful login; 0 means never.
    pub last_success_epoch: u64,
}

impl AuthRecord {
    /// The fail-open default used when storage is missing or corrupt.
    #[must_use]
    pub fn default_now() -> Self {
        Self {
            status: AuthStatus::Unknown,
            last_success_epoch: unix_now(),
        }
    }

    /// Whether the session validity window has elapsed.
    ///
    /// A record that never succeeded (`last_success_epoch == 0`) is always
    /// expired, though the decision table only consults expiry for
    /// `Authenticated` records.
    #[must_use]
    pub fn session_expired(&self, now: u64, session_duration_secs: u64) -> bool {
        now.saturating_sub(self.last_success_epoch) >= session_duration_secs
    }
}

/// Current time as Unix seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Resolves the default state directory.
///
/// Priority:
/// 1. `$XDG_STATE_HOME/portalguard`
/// 2. `$HOME/.local/state/portalguard`
#[must_use]
pub fn default_state_dir() -> Option<PathBuf> {
    if let Some(xdg_state_home) = env_var_non_empty_os("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg_state_home).join("portalguard"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("portalguard"),
    )
}

/// Durable storage for the [`AuthRecord`] plus the failure diagnostic.
///
/// `load` never fails: missing or corrupt storage falls open to a safe
/// `{Unknown, now}` record. Writes are plain overwrites; callers hold the
/// run lock around every read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Opens the store, provisioning the state directory on first use.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the state directory root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the journal file inside this store.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// Path of the run-lock file inside this store.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Path of the failure diagnostic inside this store.
    #[must_use]
    pub fn failure_diagnostic_path(&self) -> PathBuf {
        self.dir.join(FAILURE_FILE)
    }

    /// Loads the persisted record, failing open to `{Unknown, now}` when
    /// either file is missing or unparseable.
    #[must_use]
    pub fn load(&self) -> AuthRecord {
        let status_path = self.dir.join(STATUS_FILE);
        let status = match fs::read_to_string(&status_path) {
            Ok(raw) => match AuthStatus::from_label(&raw) {
                Some(status) => status,
                None => {
                    warn!(
                        path = %status_path.display(),
                        content = %raw.trim(),
                        "unrecognized status label; falling back to default record"
                    );
                    return AuthRecord::default_now();
                }
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %status_path.display(), "no persisted status; first run");
                return AuthRecord::default_now();
            }
            Err(error) => {
                warn!(
                    path = %status_path.display(),
                    %error,
                    "failed to read status; falling back to default record"
                );
                return AuthRecord::default_now();
            }
        };

        let epoch_path = self.dir.join(LAST_SUCCESS_FILE);
        let last_success_epoch = match fs::read_to_string(&epoch_path) {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(epoch) => epoch,
                Err(error) => {
                    warn!(
                        path = %epoch_path.display(),
                        %error,
                        "unparseable last-success timestamp; treating as never"
                    );
                    0
                }
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => 0,
            Err(error) => {
                warn!(
                    path = %epoch_path.display(),
                    %error,
                    "failed to read last-success timestamp; treating as never"
                );
                0
            }
        };

        AuthRecord {
            status,
            last_success_epoch,
        }
    }

    /// Persists the record as a plain overwrite of both files.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when either file cannot be written.
    pub fn save(&self, record: &AuthRecord) -> io::Result<()> {
        fs::write(self.dir.join(STATUS_FILE), record.status.as_str())?;
        fs::write(
            self.dir.join(LAST_SUCCESS_FILE),
            record.last_success_epoch.to_string(),
        )?;
        debug!(
            status = record.status.as_str(),
            last_success = record.last_success_epoch,
            "persisted auth record"
        );
        Ok(())
    }

    /// Overwrites the failure diagnostic with the raw response body from the
    /// most recent failed login attempt. Diagnostics are never accumulated.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the diagnostic cannot be written.
    pub fn save_failure_diagnostic(&self, body: &str) -> io::Result<()> {
        fs::write(self.failure_diagnostic_path(), body)
    }
}
