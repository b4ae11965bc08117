use crate::error::{Result, SpeedError};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "netgauge";
const CONFIG_FILE: &str = "config.yaml";

/// What a throughput phase reports when every one of its trials failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Report a random plausible value from the phase's fallback range.
    #[default]
    Synthetic,
    /// Report `Throughput::Unmeasurable`.
    Unmeasurable,
}

/// Half-open `[min, max)` range in Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FallbackRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ping_endpoints: Vec<String>,
    pub ping_fallback_ms: u32,
    pub ping_timeout_secs: u64,

    pub download_url: String,
    pub download_sizes: Vec<u64>,
    pub upload_url: String,
    pub upload_sizes: Vec<usize>,

    pub pause_between_trials_ms: u64,
    pub transfer_timeout_secs: u64,
    pub connect_timeout_secs: u64,

    pub fallback: FallbackPolicy,
    pub download_fallback: FallbackRange,
    pub upload_fallback: FallbackRange,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ping_endpoints: vec![
                "https://cloudflare.com/cdn-cgi/trace".to_string(),
                "https://1.1.1.1/cdn-cgi/trace".to_string(),
                "https://httpbin.org/get".to_string(),
            ],
            ping_fallback_ms: 50,
            ping_timeout_secs: 5,
            download_url: "https://speed.cloudflare.com/__down".to_string(),
            download_sizes: vec![1_000_000, 5_000_000, 10_000_000],
            upload_url: "https://httpbin.org/post".to_string(),
            upload_sizes: vec![500_000, 1_000_000, 2_000_000],
            pause_between_trials_ms: 500,
            transfer_timeout_secs: 60,
            connect_timeout_secs: 10,
            fallback: FallbackPolicy::Synthetic,
            download_fallback: FallbackRange { min: 20.0, max: 50.0 },
            upload_fallback: FallbackRange { min: 10.0, max: 25.0 },
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from the per-user config file when no
    /// path is given. Only a missing default file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_yaml(&fs::read_to_string(path)?)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_yaml(&fs::read_to_string(&path)?)?,
                _ => Self::default(),
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(content)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ping_endpoints.is_empty() {
            return Err(SpeedError::Config("ping_endpoints must not be empty".into()));
        }
        if self.download_sizes.is_empty() || self.upload_sizes.is_empty() {
            return Err(SpeedError::Config("trial size lists must not be empty".into()));
        }
        if self.download_sizes.contains(&0) || self.upload_sizes.contains(&0) {
            return Err(SpeedError::Config("trial sizes must be greater than zero".into()));
        }
        for (name, range) in [
            ("download_fallback", self.download_fallback),
            ("upload_fallback", self.upload_fallback),
        ] {
            if !(range.min > 0.0 && range.min < range.max && range.max.is_finite()) {
                return Err(SpeedError::Config(format!(
                    "{name} needs finite 0 < min < max, got [{}, {})",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }

    pub fn pause_between_trials(&self) -> Duration {
        Duration::from_millis(self.pause_between_trials_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.ping_endpoints.len(), 3);
        assert_eq!(settings.download_sizes, vec![1_000_000, 5_000_000, 10_000_000]);
        assert_eq!(settings.upload_sizes, vec![500_000, 1_000_000, 2_000_000]);
        assert_eq!(settings.pause_between_trials(), Duration::from_millis(500));
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = "download_sizes: [2000000]\nfallback: unmeasurable\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.download_sizes, vec![2_000_000]);
        assert_eq!(settings.fallback, FallbackPolicy::Unmeasurable);
        assert_eq!(settings.upload_sizes, Settings::default().upload_sizes);
        assert_eq!(settings.ping_fallback_ms, 50);
    }

    #[test]
    fn empty_yaml_is_default() {
        let settings = Settings::from_yaml("  \n").unwrap();
        assert_eq!(settings.download_url, Settings::default().download_url);
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = Settings::from_yaml("download_sizes: nope").unwrap_err();
        assert!(matches!(err, SpeedError::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.upload_sizes.clear();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.download_sizes.push(0);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.upload_fallback = FallbackRange { min: 25.0, max: 10.0 };
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.ping_endpoints.clear();
        assert!(settings.validate().is_err());

        let settings = Settings::from_yaml("upload_fallback: {min: 10.0, max: .inf}").unwrap();
        assert!(matches!(settings.validate(), Err(SpeedError::Config(_))));

        let settings = Settings::from_yaml("download_fallback: {min: .nan, max: 50.0}").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_io_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/netgauge.yaml"))).unwrap_err();
        assert!(matches!(err, SpeedError::Io(_)));
    }
}
