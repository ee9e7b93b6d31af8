//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use docfinder_core::config::{
    DEFAULT_INTERNAL_REDIRECTS, DEFAULT_PAGE_REDIRECTS, DEFAULT_WORKERS, EngineConfig,
    PolitenessBand, RedirectLimits, TimeoutSettings,
};
use docfinder_core::ResourceFamilies;
use docfinder_core::output::DEFAULT_BATCH_SIZE;
use docfinder_core::user_agent;

/// Resolve publication landing pages to their documents and datasets.
///
/// Reads one URL or `{"id": ..., "url": ...}` record per line and writes one
/// JSON outcome record per input.
#[derive(Parser, Debug)]
#[command(name = "docfinder")]
#[command(author, version, about)]
pub struct Args {
    /// Input URLs (reads stdin or --input when omitted)
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Input file with one URL or JSON record per line
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file for outcome records (stdout when omitted)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum concurrent resolutions (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: u8,

    /// Retrieve confirmed documents and datasets
    #[arg(long)]
    pub download: bool,

    /// Resource families to look for: documents, datasets or both
    #[arg(long, default_value_t = ResourceFamilies::Both, value_name = "FAMILIES")]
    pub families: ResourceFamilies,

    /// Directory for retrieved files
    #[arg(short = 'o', long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Lower bound of the per-domain politeness delay in milliseconds (0 disables)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub politeness_min_ms: u64,

    /// Upper bound of the per-domain politeness delay in milliseconds
    #[arg(long, default_value_t = 7000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub politeness_max_ms: u64,

    /// HEAD request and connect timeout in milliseconds
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..=300_000))]
    pub head_timeout_ms: u64,

    /// GET read timeout in milliseconds
    #[arg(long, default_value_t = 15_000, value_parser = clap::value_parser!(u64).range(1..=300_000))]
    pub get_timeout_ms: u64,

    /// Redirects followed for input URLs (1-20)
    #[arg(long, default_value_t = DEFAULT_PAGE_REDIRECTS, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub max_page_redirects: u8,

    /// Redirects followed for links found on a page (1-20)
    #[arg(long, default_value_t = DEFAULT_INTERNAL_REDIRECTS, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub max_internal_redirects: u8,

    /// Internal links checked per page
    #[arg(long, default_value_t = 100)]
    pub max_internal_links: usize,

    /// Records buffered before the output is flushed
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Send a User-Agent naming this tool instead of a browser one
    #[arg(long)]
    pub identify: bool,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

impl Args {
    /// Builds the engine configuration from the flags.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let politeness = if self.politeness_min_ms == 0 {
            PolitenessBand::disabled()
        } else {
            PolitenessBand::new(
                Duration::from_millis(self.politeness_min_ms),
                Duration::from_millis(self.politeness_max_ms),
            )
        };
        let user_agent = if self.identify {
            user_agent::tool_user_agent()
        } else {
            user_agent::BROWSER_USER_AGENT.to_string()
        };
        EngineConfig {
            workers: usize::from(self.workers),
            download: self.download,
            families: self.families,
            output_dir: self.output_dir.clone(),
            redirects: RedirectLimits {
                page: self.max_page_redirects,
                internal: self.max_internal_redirects,
            },
            timeouts: TimeoutSettings {
                head: Duration::from_millis(self.head_timeout_ms),
                get: Duration::from_millis(self.get_timeout_ms),
            },
            politeness,
            max_internal_links: self.max_internal_links,
            user_agent,
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["docfinder"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.workers, 10);
        assert!(!args.download);
        assert!(args.urls.is_empty());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["docfinder", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["docfinder", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["docfinder", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["docfinder", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["docfinder", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_positional_urls() {
        let args =
            Args::try_parse_from(["docfinder", "https://repo.org/1", "https://repo.org/2"]).unwrap();
        assert_eq!(args.urls.len(), 2);
    }

    // ==================== Worker Tests ====================

    #[test]
    fn test_cli_workers_short_flag() {
        let args = Args::try_parse_from(["docfinder", "-c", "5"]).unwrap();
        assert_eq!(args.workers, 5);
    }

    #[test]
    fn test_cli_workers_zero_rejected() {
        let err = Args::try_parse_from(["docfinder", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_workers_over_max_rejected() {
        let err = Args::try_parse_from(["docfinder", "--workers", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Config Mapping Tests ====================

    #[test]
    fn test_engine_config_defaults_match_library_defaults() {
        let config = Args::try_parse_from(["docfinder"]).unwrap().engine_config();
        let defaults = EngineConfig::default();
        assert_eq!(config.workers, defaults.workers);
        assert_eq!(config.redirects, defaults.redirects);
        assert_eq!(config.timeouts, defaults.timeouts);
        assert_eq!(config.politeness, defaults.politeness);
        assert_eq!(config.user_agent, user_agent::BROWSER_USER_AGENT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_maps_flags() {
        let args = Args::try_parse_from([
            "docfinder",
            "--download",
            "-o",
            "/tmp/found",
            "--max-page-redirects",
            "3",
            "--head-timeout-ms",
            "2500",
            "--identify",
        ])
        .unwrap();
        let config = args.engine_config();
        assert!(config.download);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/found"));
        assert_eq!(config.redirects.page, 3);
        assert_eq!(config.timeouts.head, Duration::from_millis(2500));
        assert!(config.user_agent.starts_with("docfinder/"));
    }

    #[test]
    fn test_families_flag() {
        let args = Args::try_parse_from(["docfinder"]).unwrap();
        assert_eq!(args.engine_config().families, ResourceFamilies::Both);

        let args = Args::try_parse_from(["docfinder", "--families", "datasets"]).unwrap();
        assert_eq!(args.engine_config().families, ResourceFamilies::Datasets);

        assert!(Args::try_parse_from(["docfinder", "--families", "images"]).is_err());
    }

    #[test]
    fn test_zero_politeness_min_disables_band() {
        let args = Args::try_parse_from(["docfinder", "--politeness-min-ms", "0"]).unwrap();
        assert!(args.engine_config().politeness.is_disabled());
    }

    #[test]
    fn test_inverted_politeness_band_fails_validation() {
        let args = Args::try_parse_from([
            "docfinder",
            "--politeness-min-ms",
            "5000",
            "--politeness-max-ms",
            "1000",
        ])
        .unwrap();
        assert!(args.engine_config().validate().is_err());
    }
}
