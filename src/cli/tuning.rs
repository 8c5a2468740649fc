//! Probe tuning flags shared by `probe` and `run`.
//!
//! Every flag is optional; an absent flag falls back to the settings file.

use crate::config::AppSettings;
use crate::error::{CliError, CliResult};
use crate::liveness::LivenessOptions;
use crate::merge::MergeOrder;
use crate::prober::SkipRules;
use crate::types::KeywordSet;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// Request timeout in seconds
    #[arg(short = 't', long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Attempts per URL
    #[arg(short = 'r', long, value_name = "N")]
    pub retries: Option<u32>,

    /// Pause after every attempt, in seconds
    #[arg(short = 'd', long, value_name = "SECS")]
    pub delay: Option<f64>,

    /// Comma-separated soft-404 title keywords
    #[arg(short = 'k', long, value_name = "LIST")]
    pub not_found_keywords: Option<KeywordSet>,

    /// Number of chunks, one worker each (0 or 1 = a single worker)
    #[arg(short = 'c', long, value_name = "N")]
    pub chunks: Option<usize>,

    /// Global requests per second across workers (0 = unlimited)
    #[arg(long, value_name = "N")]
    pub rate: Option<u32>,

    /// Add random jitter to every pause
    #[arg(long)]
    pub jitter: bool,

    /// Order of the alive artifact
    #[arg(long, value_enum)]
    pub order: Option<MergeOrder>,

    /// Glob of URL paths never probed (repeatable)
    #[arg(long = "skip-pattern", value_name = "GLOB")]
    pub skip_patterns: Vec<String>,

    /// Comma-separated file extensions never probed
    #[arg(long = "exclude-ext", value_name = "LIST", value_delimiter = ',')]
    pub exclude_extensions: Vec<String>,

    /// Save the body of every alive page under DIR
    #[arg(long, value_name = "DIR")]
    pub html_dump_dir: Option<PathBuf>,

    /// Skip a path after three identical non-alive outcomes in one worker
    /// (results then depend on --chunks)
    #[arg(long)]
    pub suppress_repeated: bool,

    /// Ceiling for the delay after challenge pages, in seconds
    #[arg(long, value_name = "SECS")]
    pub max_backoff: Option<u64>,
}

impl TuningArgs {
    /// Overlay these flags on `settings`.
    pub fn liveness_options(
        &self,
        settings: &AppSettings,
        progress: bool,
    ) -> CliResult<LivenessOptions> {
        let mut settings = settings.clone();
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            settings.retries = retries;
        }
        if let Some(delay) = self.delay {
            settings.delay_secs = delay;
        }
        if let Some(ref keywords) = self.not_found_keywords {
            settings.not_found_keywords = keywords.clone();
        }
        if let Some(max_backoff) = self.max_backoff {
            settings.max_backoff_secs = max_backoff;
        }
        settings.validate()?;

        let patterns = settings.skip_patterns.iter().chain(&self.skip_patterns);
        let extensions = settings
            .exclude_extensions
            .iter()
            .chain(&self.exclude_extensions);
        let skip = SkipRules::new()
            .with_patterns(patterns)
            .map_err(|e| CliError::InvalidArgument(format!("bad skip pattern: {}", e)))?
            .with_excluded_extensions(extensions);

        Ok(LivenessOptions {
            probe: settings.probe_config().with_jitter(self.jitter),
            chunks: self.chunks.unwrap_or(settings.chunks),
            rate: self.rate.unwrap_or(settings.rate_limit),
            order: self.order.unwrap_or_default(),
            skip,
            suppress_repeated: self.suppress_repeated || settings.suppress_repeated_failures,
            html_dump_dir: self.html_dump_dir.clone(),
            progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        tuning: TuningArgs,
    }

    fn parse(args: &[&str]) -> TuningArgs {
        Harness::try_parse_from(std::iter::once("urlsift").chain(args.iter().copied()))
            .unwrap()
            .tuning
    }

    #[test]
    fn test_absent_flags_use_settings() {
        let settings = AppSettings {
            retries: 5,
            chunks: 7,
            rate_limit: 20,
            ..AppSettings::default()
        };
        let options = parse(&[]).liveness_options(&settings, false).unwrap();

        assert_eq!(options.probe.retries, 5);
        assert_eq!(options.chunks, 7);
        assert_eq!(options.rate, 20);
        assert_eq!(options.order, MergeOrder::Lexical);
        assert!(!options.skip.is_empty());
        assert!(!options.suppress_repeated);

        let no_patterns = AppSettings {
            skip_patterns: Vec::new(),
            ..AppSettings::default()
        };
        let options = parse(&[]).liveness_options(&no_patterns, false).unwrap();
        assert!(options.skip.is_empty());
    }

    #[test]
    fn test_suppression_is_opt_in() {
        let settings = AppSettings::default();
        assert!(parse(&["--suppress-repeated"])
            .liveness_options(&settings, false)
            .unwrap()
            .suppress_repeated);

        let enabled = AppSettings {
            suppress_repeated_failures: true,
            ..AppSettings::default()
        };
        assert!(parse(&[]).liveness_options(&enabled, false).unwrap().suppress_repeated);
    }

    #[test]
    fn test_flags_override_settings() {
        let args = parse(&[
            "-r", "2", "-c", "3", "-k", "Gone,Missing", "--order", "input",
            "--exclude-ext", "png,css", "--skip-pattern", "/static/*", "--skip-pattern", "*/tag/*",
        ]);
        let options = args.liveness_options(&AppSettings::default(), false).unwrap();

        assert_eq!(options.probe.retries, 2);
        assert_eq!(options.chunks, 3);
        assert_eq!(options.order, MergeOrder::Input);
        assert_eq!(
            options.probe.keywords.iter().collect::<Vec<_>>(),
            vec!["gone", "missing"]
        );
        assert!(!options.skip.is_empty());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let settings = AppSettings::default();
        assert!(parse(&["-t", "0"]).liveness_options(&settings, false).is_err());
        assert!(parse(&["--delay=-1"]).liveness_options(&settings, false).is_err());
        assert!(parse(&["--delay", "1e300"]).liveness_options(&settings, false).is_err());
    }
}
