//! Portalguard Core Library
//!
//! This library provides the core functionality for the portalguard tool,
//! which detects captive-portal redirects on the local network and clears
//! them by driving the gateway's login form, keeping a persisted
//! authentication record so repeated checks stay cheap and idempotent.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`state`] - Persisted authentication record and the host-wide run lock
//! - [`probe`] - Cheap DNS-based connectivity probe
//! - [`portal`] - The multi-step portal login protocol
//! - [`orchestrator`] - The per-invocation decision state machine
//! - [`journal`] - Append-only timestamped event log
//! - [`config`] - File configuration and credentials

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod journal;
pub mod orchestrator;
pub mod portal;
pub mod probe;
pub mod state;

// Re-export commonly used types
pub use config::{Credentials, FileConfig, load_default_file_config, resolve_default_config_path};
pub use journal::Journal;
pub use orchestrator::{Action, Orchestrator, RunOutcome, decide};
pub use portal::{LoginOutcome, PortalError, PortalLogin, PortalSession, SessionArtifacts};
pub use probe::{Connectivity, DnsProbe};
pub use state::{AuthRecord, AuthStatus, LockError, RunLock, StateStore};

/// Default session validity window in seconds (12 hours).
pub const DEFAULT_SESSION_DURATION_SECS: u64 = 43_200;
