//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Detect and automatically clear captive-portal redirects.
///
/// Portalguard runs one decision cycle per invocation: it checks the
/// persisted authentication state and current connectivity, then skips,
/// marks the session authenticated, or drives the portal login protocol.
/// Scheduling repeated runs is left to a timer or interface-event hook.
#[derive(Parser, Debug)]
#[command(name = "portalguard")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to the config file (default: $XDG_CONFIG_HOME/portalguard/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// State directory override (default: $XDG_STATE_HOME/portalguard)
    #[arg(long, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// Attempt a portal login even if the session still looks valid
    #[arg(long)]
    pub force_login: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["portalguard"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.config.is_none());
        assert!(args.state_dir.is_none());
        assert!(!args.force_login);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["portalguard", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["portalguard", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["portalguard", "-q"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_config_and_state_dir_paths() {
        let args = Args::try_parse_from([
            "portalguard",
            "--config",
            "/etc/portalguard.conf",
            "--state-dir",
            "/var/lib/portalguard",
        ])
        .unwrap();
        assert_eq!(
            args.config.as_deref(),
            Some(std::path::Path::new("/etc/portalguard.conf"))
        );
        assert_eq!(
            args.state_dir.as_deref(),
            Some(std::path::Path::new("/var/lib/portalguard"))
        );
    }

    #[test]
    fn test_cli_force_login_flag() {
        let args = Args::try_parse_from(["portalguard", "--force-login"]).unwrap();
        assert!(args.force_login);
    }

    #[test]
    fn test_cli_positional_arguments_rejected() {
        // The entry point is parameterless; flags only override config.
        let result = Args::try_parse_from(["portalguard", "unexpected"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["portalguard", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["portalguard", "--invalid-flag"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
