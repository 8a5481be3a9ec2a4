//! Interceptor configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config.
//!
//! ```json
//! {
//!   "recompile_quiet_period": "3s",
//!   "hit_channel_pattern": "chrome-extension://*/elemhidehit.png",
//!   "forced_referrers": [
//!     { "url_pattern": "*://injections.example.com/*", "referer": "http://injections.example.com/" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wildmatch::WildMatch;

use crate::url::strip_fragment;

/// Quiet period before filter changes are pushed to the browser.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(3000);

/// Match pattern that accepts every URL.
pub const ALL_URLS: &str = "<all_urls>";

/// Pseudo-URL that content scripts load to report cosmetic rule hits. The
/// non-http scheme keeps it out of request rule evaluation.
pub const DEFAULT_HIT_CHANNEL_PATTERN: &str = "chrome-extension://*/elemhidehit.png";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid URL pattern: {0:?}")]
    InvalidPattern(String),
}

// =============================================================================
// Config
// =============================================================================

/// Request interceptor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterceptorConfig {
    /// How long filter changes must be quiet before the browser is told to
    /// drop its cached request handling
    #[serde(with = "humantime_serde")]
    pub recompile_quiet_period: Duration,
    /// URL pattern of the cosmetic rule hit channel
    pub hit_channel_pattern: String,
    /// Hosts whose requests always carry a fixed `Referer`
    pub forced_referrers: Vec<ForcedReferrer>,
}

/// Force the `Referer` of every request matching `url_pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedReferrer {
    pub url_pattern: String,
    pub referer: String,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            recompile_quiet_period: DEFAULT_QUIET_PERIOD,
            hit_channel_pattern: DEFAULT_HIT_CHANNEL_PATTERN.to_string(),
            forced_referrers: Vec::new(),
        }
    }
}

impl InterceptorConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Check that every pattern compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        UrlFilter::parse(&self.hit_channel_pattern)?;
        for forced in &self.forced_referrers {
            UrlFilter::parse(&forced.url_pattern)?;
        }
        Ok(())
    }
}

// =============================================================================
// URL Filters
// =============================================================================

/// URL filter of a hook registration.
#[derive(Debug, Clone)]
pub enum UrlFilter {
    /// `<all_urls>`
    AllUrls,
    /// Glob over the URL without its fragment
    Pattern(WildMatch),
}

impl UrlFilter {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(ConfigError::InvalidPattern(pattern.to_string()));
        }
        if pattern == ALL_URLS {
            return Ok(Self::AllUrls);
        }
        Ok(Self::Pattern(WildMatch::new(pattern)))
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::AllUrls => true,
            Self::Pattern(glob) => glob.matches(strip_fragment(url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = InterceptorConfig::from_json("{}").expect("config");
        assert_eq!(config, InterceptorConfig::default());
        assert_eq!(config.recompile_quiet_period, Duration::from_secs(3));
    }

    #[test]
    fn test_parse_full_config() {
        let config = InterceptorConfig::from_json(
            r#"{
                "recompile_quiet_period": "500ms",
                "hit_channel_pattern": "chrome-extension://*/elemhidehit.png",
                "forced_referrers": [
                    { "url_pattern": "*://injections.example.com/*", "referer": "http://injections.example.com/" }
                ]
            }"#,
        )
        .expect("config");

        assert_eq!(config.recompile_quiet_period, Duration::from_millis(500));
        assert_eq!(config.forced_referrers.len(), 1);
        assert_eq!(config.forced_referrers[0].referer, "http://injections.example.com/");
    }

    #[test]
    fn test_rejects_unknown_fields_and_empty_patterns() {
        assert!(matches!(
            InterceptorConfig::from_json(r#"{ "quiet": "1s" }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            InterceptorConfig::from_json(r#"{ "hit_channel_pattern": " " }"#),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_url_filter() {
        let hit = UrlFilter::parse(DEFAULT_HIT_CHANNEL_PATTERN).expect("pattern");
        assert!(hit.matches("chrome-extension://abc/elemhidehit.png#1;%23%23.ad"));
        assert!(!hit.matches("chrome-extension://abc/elemhidehit.png.js"));
        assert!(!hit.matches("https://example.com/"));
        assert!(!hit.matches("https://example.com/elemhidehit.png#1;%23%23.ad"));

        let all = UrlFilter::parse(ALL_URLS).expect("pattern");
        assert!(all.matches("ws://example.com/socket"));
    }
}
