//! Application settings and paths.
//!
//! Settings live in an XDG-compliant config directory unless a file is given
//! explicitly. Every field has a default, so a partial file is fine.

use crate::error::{ConfigError, ConfigResult};
use crate::prober::{ProbeConfig, DEFAULT_CHALLENGE_MARKERS};
use crate::types::KeywordSet;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted pause after an attempt, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Path globs of taxonomy and locale listings skipped unless configured
/// otherwise.
pub const DEFAULT_SKIP_PATTERNS: [&str; 3] = ["*/tag/*", "*/id/*", "*/en/*"];

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/urlsift)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the platform directories; nothing is created.
    pub fn resolve() -> ConfigResult<Self> {
        let project = ProjectDirs::from("io", "urlsift", "urlsift")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    /// Get the path to the user's default pipeline definition.
    pub fn pipeline_file(&self) -> PathBuf {
        self.config_dir.join("pipeline.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per URL.
    pub retries: u32,
    /// Pause after every attempt, in seconds.
    pub delay_secs: f64,
    /// Soft-404 title keywords.
    pub not_found_keywords: KeywordSet,
    /// Number of chunks (and workers).
    pub chunks: usize,
    /// Global requests per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Markers of WAF challenge pages.
    pub challenge_markers: Vec<String>,
    /// Ceiling for the escalated delay, in seconds.
    pub max_backoff_secs: u64,
    /// Glob patterns of URL paths never probed; an empty list disables
    /// skipping by pattern.
    pub skip_patterns: Vec<String>,
    /// File extensions never probed.
    pub exclude_extensions: Vec<String>,
    /// Skip a path after three identical non-alive outcomes in one worker.
    /// The alive set then depends on the chunk count.
    pub suppress_repeated_failures: bool,
    /// Root of per-target pipeline directories.
    pub workdir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retries: 3,
            delay_secs: 1.0,
            not_found_keywords: KeywordSet::default(),
            chunks: 4,
            rate_limit: 0,
            challenge_markers: DEFAULT_CHALLENGE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_backoff_secs: 15,
            skip_patterns: DEFAULT_SKIP_PATTERNS.iter().map(|p| p.to_string()).collect(),
            exclude_extensions: Vec::new(),
            suppress_repeated_failures: false,
            workdir: PathBuf::from("output"),
        }
    }
}

impl AppSettings {
    /// Load settings from `explicit`, or from the default location.
    ///
    /// An explicit file must exist; a missing default file means defaults.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let file = match Paths::resolve() {
            Ok(paths) => paths.settings_file(),
            Err(e) => {
                tracing::debug!(error = %e, "no config directory, using default settings");
                return Ok(Self::default());
            }
        };

        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Save settings to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("timeout_secs must be at least 1".to_string()));
        }
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "delay_secs must be a non-negative number, got {}",
                self.delay_secs
            )));
        }
        if self.delay_secs > MAX_DELAY_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "delay_secs must be at most {}, got {}",
                MAX_DELAY_SECS, self.delay_secs
            )));
        }
        Ok(())
    }

    /// Probe configuration described by these settings.
    ///
    /// Expects validated settings; a delay that is not a valid duration
    /// becomes zero.
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig::new()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retries(self.retries)
            .with_delay(Duration::try_from_secs_f64(self.delay_secs).unwrap_or_default())
            .with_keywords(self.not_found_keywords.clone())
            .with_challenge_markers(&self.challenge_markers)
            .with_max_backoff(Duration::from_secs(self.max_backoff_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.timeout_secs, 10);
        assert_eq!(settings.retries, 3);
        assert_eq!(settings.chunks, 4);
        assert_eq!(settings.not_found_keywords.len(), 3);
        assert_eq!(settings.skip_patterns, vec!["*/tag/*", "*/id/*", "*/en/*"]);
        assert!(!settings.suppress_repeated_failures);
    }

    #[test]
    fn test_empty_skip_patterns_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"skip_patterns": []}"#).unwrap();

        assert!(AppSettings::load(Some(&path)).unwrap().skip_patterns.is_empty());
    }

    #[test]
    fn test_huge_delay_is_rejected() {
        for delay in [1e300, MAX_DELAY_SECS + 1.0, f64::INFINITY] {
            let settings = AppSettings {
                delay_secs: delay,
                ..AppSettings::default()
            };
            assert!(matches!(settings.validate(), Err(ConfigError::InvalidValue(_))));
        }

        let longest = AppSettings {
            delay_secs: MAX_DELAY_SECS,
            ..AppSettings::default()
        };
        assert!(longest.validate().is_ok());
        assert_eq!(longest.probe_config().delay, Duration::from_secs(3600));
    }

    #[test]
    fn test_probe_config_never_panics_on_unvalidated_delay() {
        let settings = AppSettings {
            delay_secs: 1e300,
            ..AppSettings::default()
        };
        assert_eq!(settings.probe_config().delay, Duration::ZERO);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"retries": 5, "not_found_keywords": ["Page Missing"]}"#).unwrap();

        let settings = AppSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.retries, 5);
        assert_eq!(settings.timeout_secs, 10);
        assert_eq!(
            settings.not_found_keywords.iter().collect::<Vec<_>>(),
            vec!["page missing"]
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, r#"{"delay_secs": -1}"#).unwrap();
        assert!(matches!(
            AppSettings::load(Some(&path)),
            Err(ConfigError::InvalidValue(_))
        ));

        fs::write(&path, r#"{"not_found_keywords": [" ", ""]}"#).unwrap();
        assert!(matches!(
            AppSettings::load(Some(&path)),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = AppSettings::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/settings.json");
        let settings = AppSettings {
            delay_secs: 0.5,
            ..AppSettings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_probe_config() {
        let config = AppSettings::default().probe_config();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.delay, Duration::from_secs(1));
        assert_eq!(config.challenge_markers, vec!["one moment".to_string()]);
    }
}
