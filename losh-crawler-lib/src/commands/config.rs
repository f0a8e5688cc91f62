use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "losh.toml";

const MAX_RETRY_COUNT: u32 = 20;

/// At most `max_requests` requests within any `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    pub max_requests: u32,

    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout of a single request attempt
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Retries on top of the first attempt for transient failures
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay before the first retry, doubled for every further one
    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    pub retry_base_delay: Duration,

    /// Upper bound of any single retry delay
    #[serde(default = "default_max_wait", with = "humantime_serde")]
    pub max_wait: Duration,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Size limit in bytes of downloaded metadata documents
    #[serde(default = "default_max_manifest_size")]
    pub max_manifest_size: u64,

    /// Number of products crawled concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_graphql_endpoint")]
    pub graphql_endpoint: String,

    #[serde(default = "default_spdx_license_list_url")]
    pub spdx_license_list_url: String,

    #[serde(default = "default_graphql_rate_limit")]
    pub graphql_rate_limit: RateLimitConfig,

    #[serde(default = "default_file_rate_limit")]
    pub file_rate_limit: RateLimitConfig,
}

fn default_user_agent() -> String {
    "LOSH Bot (github.com/aisbergg/losh)".to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_retry_count() -> u32 {
    5
}

const fn default_retry_base_delay() -> Duration {
    Duration::from_secs(1)
}

const fn default_max_wait() -> Duration {
    Duration::from_mins(5)
}

const fn default_max_redirects() -> usize {
    5
}

const fn default_max_manifest_size() -> u64 {
    10 * 1024 * 1024
}

const fn default_concurrency() -> usize {
    4
}

fn default_graphql_endpoint() -> String {
    crate::platforms::wikifactory::WIKIFACTORY_GRAPHQL_ENDPOINT.to_string()
}

fn default_spdx_license_list_url() -> String {
    crate::licenses::SPDX_LICENSE_LIST_URL.to_string()
}

const fn default_graphql_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        max_requests: 20,
        window: Duration::from_secs(5),
    }
}

const fn default_file_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        max_requests: 5,
        window: Duration::from_secs(1),
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `losh.toml` in `base_dir` is used if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds invalid values
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(app_err!("user_agent must not be empty"));
        }

        if self.request_timeout.is_zero() {
            return Err(app_err!("request_timeout must be greater than zero"));
        }

        if self.retry_count > MAX_RETRY_COUNT {
            return Err(app_err!("retry_count must be at most {MAX_RETRY_COUNT}, got {}", self.retry_count));
        }

        if self.retry_base_delay > self.max_wait {
            return Err(app_err!(
                "retry_base_delay ({:?}) must not exceed max_wait ({:?})",
                self.retry_base_delay,
                self.max_wait
            ));
        }

        if self.concurrency == 0 {
            return Err(app_err!("concurrency must be at least 1"));
        }

        if self.max_manifest_size == 0 {
            return Err(app_err!("max_manifest_size must be greater than zero"));
        }

        for (name, limit) in [("graphql_rate_limit", &self.graphql_rate_limit), ("file_rate_limit", &self.file_rate_limit)] {
            if limit.max_requests == 0 {
                return Err(app_err!("{name}.max_requests must be at least 1"));
            }
            if limit.window.is_zero() {
                return Err(app_err!("{name}.window must be greater than zero"));
            }
        }

        for (name, url) in [("graphql_endpoint", &self.graphql_endpoint), ("spdx_license_list_url", &self.spdx_license_list_url)] {
            let _ = Url::parse(url).into_app_err_with(|| format!("{name} is not a valid URL: '{url}'"))?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
    }

    #[test]
    fn test_default_config_matches_field_defaults() {
        let from_file = Config::default();
        let from_empty: Config = toml::from_str("").unwrap();
        assert_eq!(from_file, from_empty);
    }

    #[test]
    fn test_default_rate_limits() {
        let config = Config::default();
        assert_eq!(config.graphql_rate_limit.max_requests, 20);
        assert_eq!(config.graphql_rate_limit.window, Duration::from_secs(5));
        assert_eq!(config.file_rate_limit.max_requests, 5);
        assert_eq!(config.file_rate_limit.window, Duration::from_secs(1));
        assert_eq!(config.max_wait, Duration::from_mins(5));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = Config { concurrency: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_too_many_retries() {
        let config = Config { retry_count: 21, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_base_delay_above_max_wait() {
        let config = Config {
            retry_base_delay: Duration::from_mins(10),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_rate_limit() {
        let config = Config {
            file_rate_limit: RateLimitConfig {
                max_requests: 0,
                window: Duration::from_secs(1),
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_endpoint() {
        let config = Config {
            graphql_endpoint: "not a url".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
retry_count = 2
[file_rate_limit]
max_requests = 1
window = "2s"
"#,
        )
        .unwrap();
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.file_rate_limit.window, Duration::from_secs(2));
        assert_eq!(config.graphql_rate_limit, default_graphql_rate_limit());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(toml::from_str::<Config>("retries = 3").is_err());
        assert!(toml::from_str::<Config>("[file_rate_limit]\nmax_requests = 1\nwindow = \"1s\"\nburst = 2").is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let output_path = Utf8PathBuf::try_from(tmp.path().join("losh.toml")).unwrap();
        Config::save_default(&output_path).unwrap();
        let loaded = Config::load(&Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap(), Some(&output_path)).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let base_dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let config = Config::load(&base_dir, None).unwrap();
        assert_eq!(config, Config::default());
    }
}
