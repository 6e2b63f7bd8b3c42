//! Deployment configuration.
//!
//! Loaded from an optional TOML file; every field has a default, so an empty
//! file (or no file) is a valid configuration.  CLI flags are applied on top
//! in `main.rs`.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::scan::DEFAULT_SCAN_PROMPT;
use crate::scheduler::{ScheduleConfig, DEFAULT_COOLDOWN_SECS};
use crate::source::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

/// Longest refresh interval accepted.
pub const MAX_INTERVAL_SECS: u32 = 3600;

/// Prompt used when the config does not override it.
pub const DEFAULT_PROMPT: &str = "You are a real-time trend monitor. Current time: {timestamp}.

Use Google Search to find what is trending in the United States right now \
(roughly the last hour): viral news, social media spikes, breaking events.

Return ONLY a JSON array (no markdown) of 20 to 30 objects with these fields:
- topic: short label for the trend
- category: one of Breaking, Viral, Politics, Tech, Sports, Entertainment, Finance
- description: why it is trending, at most 12 words
- volumeScore: integer 1-100 for social media heat
- sentiment: one of positive, negative, neutral, viral
- location: optional region where it is concentrated";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Deployment tier; picks the default refresh interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Standard,
    Paid,
}

impl Tier {
    pub fn default_interval_secs(self) -> u32 {
        match self {
            Tier::Standard => 30,
            Tier::Paid => 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tier: Tier,
    /// Overrides the tier's interval when set.
    pub refresh_interval_secs: Option<u32>,
    pub cooldown_secs: u32,
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Env file consulted before the process environment.
    pub env_file: PathBuf,
    pub prompt: String,
    /// Instruction text for the `scan` subcommand.
    pub scan_prompt: String,
    /// Render topics as `$TICKER` symbols.
    pub ticker_mode: bool,
    pub request_timeout_secs: u64,
    pub export_dir: PathBuf,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tier: Tier::default(),
            refresh_interval_secs: None,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            env_file: PathBuf::from(".env"),
            prompt: DEFAULT_PROMPT.to_string(),
            scan_prompt: DEFAULT_SCAN_PROMPT.to_string(),
            ticker_mode: false,
            request_timeout_secs: 60,
            export_dir: PathBuf::from("."),
            log_file: PathBuf::from("trend-pulse.log"),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn effective_interval_secs(&self) -> u32 {
        self.refresh_interval_secs
            .unwrap_or_else(|| self.tier.default_interval_secs())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.effective_interval_secs();
        if !(1..=MAX_INTERVAL_SECS).contains(&interval) {
            return Err(ConfigError::Invalid(format!(
                "refresh_interval_secs must be within 1..={MAX_INTERVAL_SECS}, got {interval}"
            )));
        }
        if self.cooldown_secs == 0 {
            return Err(ConfigError::Invalid("cooldown_secs must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::Invalid("api_key_env must not be empty".into()));
        }
        Ok(())
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            refresh_interval_secs: self.effective_interval_secs(),
            cooldown_secs: self.cooldown_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.tier, Tier::Standard);
        assert_eq!(cfg.effective_interval_secs(), 30);
        assert_eq!(cfg.cooldown_secs, DEFAULT_COOLDOWN_SECS);
        assert_eq!(cfg.api_key_env, "GEMINI_API_KEY");
        assert!(cfg.prompt.contains("{timestamp}"));
        assert_eq!(cfg.env_file, PathBuf::from(".env"));
        assert_eq!(cfg.scan_prompt, DEFAULT_SCAN_PROMPT);
    }

    #[test]
    fn paid_tier_refreshes_faster() {
        let cfg = Config::from_toml_str(r#"tier = "paid""#).unwrap();
        assert_eq!(cfg.schedule().refresh_interval_secs, 20);
    }

    #[test]
    fn explicit_interval_overrides_tier() {
        let cfg = Config::from_toml_str(
            r#"
            tier = "paid"
            refresh_interval_secs = 45
            cooldown_secs = 90
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.schedule(),
            ScheduleConfig {
                refresh_interval_secs: 45,
                cooldown_secs: 90
            }
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = Config::from_toml_str("refresh_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_cooldown_is_rejected() {
        assert!(matches!(
            Config::from_toml_str("cooldown_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_tier_is_a_parse_error() {
        assert!(matches!(
            Config::from_toml_str(r#"tier = "platinum""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ticker_mode = true\nmodel = \"gemini-pro\"").unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert!(cfg.ticker_mode);
        assert_eq!(cfg.model, "gemini-pro");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn no_path_means_defaults() {
        let cfg = Config::load_or_default(None).unwrap();
        assert_eq!(cfg.model, DEFAULT_MODEL);
    }
}
