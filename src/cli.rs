//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use resource_cache::cache::UpdatePolicy;
use resource_cache::version::VersionString;
use url::Url;

/// Fetch artifacts into the local resource cache.
///
/// Every URL is registered, downloaded (or revalidated) in parallel, and
/// printed as `<url>\t<cached path>`, or `<url>\tERROR` when it could not
/// be fetched.
///
/// Exit status: 0 when everything is cached, 1 when any download failed,
/// 2 when --timeout elapsed first.
#[derive(Parser, Debug)]
#[command(name = "rescache")]
#[command(author, version, about)]
pub struct Args {
    /// Locations to cache
    #[arg(required = true, num_args = 1..)]
    pub urls: Vec<Url>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Cache root directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub parallel: Option<u8>,

    /// Version to request for every URL (e.g. `1.2`, `1.0+`, `2.0*`)
    #[arg(long, value_name = "VERSION")]
    pub version_id: Option<VersionString>,

    /// Also try `.pack.gz` variants of each URL
    #[arg(long)]
    pub pack: bool,

    /// Also try `<name>__V<version>.<ext>` variants of each URL
    #[arg(long)]
    pub versioned: bool,

    /// When to revalidate cached copies: always, never, force, or <millis>ms
    #[arg(long, value_name = "POLICY")]
    pub update_policy: Option<UpdatePolicy>,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore config files
    #[arg(long)]
    pub no_config: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    const URL: &str = "http://example.com/app.jar";

    #[test]
    fn test_cli_minimal_args() {
        let args = Args::try_parse_from(["rescache", URL]).unwrap();
        assert_eq!(args.urls, vec![Url::parse(URL).unwrap()]);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.parallel.is_none());
        assert!(args.update_policy.is_none());
        assert!(!args.pack);
        assert!(!args.versioned);
    }

    #[test]
    fn test_cli_requires_url() {
        let err = Args::try_parse_from(["rescache"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_rejects_invalid_url() {
        let err = Args::try_parse_from(["rescache", "not a url"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["rescache", "-vv", URL]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["rescache", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["rescache", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    // ==================== Parallel Tests ====================

    #[test]
    fn test_cli_parallel_short_flag() {
        let args = Args::try_parse_from(["rescache", "-j", "5", URL]).unwrap();
        assert_eq!(args.parallel, Some(5));
    }

    #[test]
    fn test_cli_parallel_zero_rejected() {
        let err = Args::try_parse_from(["rescache", "-j", "0", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_parallel_over_max_rejected() {
        let err = Args::try_parse_from(["rescache", "--parallel", "101", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Resolution Flag Tests ====================

    #[test]
    fn test_cli_version_and_naming_flags() {
        let args = Args::try_parse_from([
            "rescache",
            "--version-id",
            "1.0+",
            "--pack",
            "--versioned",
            URL,
        ])
        .unwrap();
        assert_eq!(args.version_id.unwrap().as_str(), "1.0+");
        assert!(args.pack);
        assert!(args.versioned);
    }

    #[test]
    fn test_cli_update_policy_parses() {
        let args = Args::try_parse_from(["rescache", "--update-policy", "250ms", URL]).unwrap();
        assert_eq!(
            args.update_policy,
            Some(UpdatePolicy::After(Duration::from_millis(250)))
        );
        let err = Args::try_parse_from(["rescache", "--update-policy", "later", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_timeout_must_be_positive() {
        let err = Args::try_parse_from(["rescache", "--timeout", "0", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Config Flag Tests ====================

    #[test]
    fn test_cli_config_conflicts_with_no_config() {
        let err = Args::try_parse_from(["rescache", "--config", "a.toml", "--no-config", URL])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
