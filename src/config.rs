use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub endpoint: String,
    pub base_url: String,
    pub production: bool,

    // Push webhook
    pub verify_token: String,
    pub app_secret: String,
    pub graph_api_url: String,
    pub graph_access_token: Option<String>,

    // Mastodon
    pub instance_url: String,
    pub account_url: String,
    pub access_token: Option<String>,
    pub visibility: String,
    pub post_tags: String,
    pub max_tries: u32,

    // Image processing
    pub upscale_providers: Vec<String>,
    pub realcugan_path: Option<PathBuf>,
    pub relay_quality: u8,
    pub publish_quality: u8,
    pub work_dir: Option<PathBuf>,

    // Providers
    pub safebooru_url: String,
    pub konachan_url: String,
    pub http_timeout: Duration,

    // Ingestion
    pub blocked_words: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/dotmoe.sqlite")),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            endpoint: normalize_endpoint(&env_or_default("ENDPOINT", "")),
            base_url: env_or_default("BASE_URL", "https://dotmoe.aozora.my.id"),
            production: parse_env_bool("PRODUCTION", false)?,

            // Push webhook
            verify_token: env_or_default("AUTH_TOKEN", ""),
            app_secret: env_or_default("APP_TOKEN", "0"),
            graph_api_url: env_or_default("GRAPH_API_URL", "https://graph.facebook.com/v19.0"),
            graph_access_token: optional_env("GRAPH_ACCESS_TOKEN"),

            // Mastodon
            instance_url: env_or_default("INSTANCE_URL", "https://sakurajima.moe"),
            account_url: env_or_default("ACCOUNT_URL", "https://sakurajima.moe/@dotmoe"),
            access_token: optional_env("TOKEN"),
            visibility: env_or_default("VISIBILITY", "public"),
            post_tags: env_or_default("POST_TAGS", constants::DEFAULT_TAGS),
            max_tries: parse_env_u32("MAX_TRIES", constants::MAX_TRIES)?,

            // Image processing
            upscale_providers: parse_list(&env_or_default("UPSCALE_PROVIDERS", "Facebook")),
            realcugan_path: optional_env("REALCUGAN_PATH").map(PathBuf::from),
            relay_quality: parse_env_u8("RELAY_QUALITY", 80)?,
            publish_quality: parse_env_u8("PUBLISH_QUALITY", 100)?,
            work_dir: optional_env("WORK_DIR").map(PathBuf::from),

            // Providers
            safebooru_url: env_or_default("SAFEBOORU_URL", "https://safebooru.org"),
            konachan_url: env_or_default("KONACHAN_URL", "https://konachan.net"),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 60)?),

            // Ingestion
            blocked_words: parse_list(&env_or_default("CLASSIFIER_BLOCKED_WORDS", "")),
        })
    }

    /// A self-contained configuration for tests. Every external base URL points
    /// at a closed local port until a test overrides it.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            endpoint: String::new(),
            base_url: "http://localhost".to_string(),
            production: false,
            verify_token: "verify-me".to_string(),
            app_secret: "app-secret".to_string(),
            graph_api_url: "http://127.0.0.1:9".to_string(),
            graph_access_token: None,
            instance_url: "http://127.0.0.1:9".to_string(),
            account_url: "https://example.social/@dotmoe".to_string(),
            access_token: Some("test-token".to_string()),
            visibility: "public".to_string(),
            post_tags: constants::DEFAULT_TAGS.to_string(),
            max_tries: constants::MAX_TRIES,
            upscale_providers: vec!["Facebook".to_string()],
            realcugan_path: None,
            relay_quality: 80,
            publish_quality: 100,
            work_dir: None,
            safebooru_url: "http://127.0.0.1:9".to_string(),
            konachan_url: "http://127.0.0.1:9".to_string(),
            http_timeout: Duration::from_secs(5),
            blocked_words: Vec::new(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_TRIES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, quality) in [
            ("RELAY_QUALITY", self.relay_quality),
            ("PUBLISH_QUALITY", self.publish_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("must be between 1 and 100, got {quality}"),
                });
            }
        }
        if !self.instance_url.starts_with("http://") && !self.instance_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                name: "INSTANCE_URL".to_string(),
                message: format!("must be an http(s) URL, got '{}'", self.instance_url),
            });
        }
        Ok(())
    }

    /// [`Self::validate`] plus the settings only the web service needs.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or `AUTH_TOKEN` is unset.
    pub fn validate_server(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.verify_token.is_empty() {
            return Err(ConfigError::MissingEnvVar("AUTH_TOKEN".to_string()));
        }
        Ok(())
    }

    /// Join a route path onto the configured endpoint prefix.
    #[must_use]
    pub fn route(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u8(name: &str, default: u8) -> Result<u8, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Endpoint prefixes are stored without a trailing slash; "/" means no prefix.
fn normalize_endpoint(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("Facebook, Pixiv ,,"), vec!["Facebook", "Pixiv"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint(""), "");
        assert_eq!(normalize_endpoint("/"), "");
        assert_eq!(normalize_endpoint("moe/"), "/moe");
        assert_eq!(normalize_endpoint("/moe"), "/moe");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_env_bool("NONEXISTENT_VAR", true).unwrap());
        assert!(!parse_env_bool("NONEXISTENT_VAR", false).unwrap());
    }

    #[test]
    fn test_validate_rejects_zero_tries() {
        let config = Config {
            max_tries: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
        assert!(Config::for_testing().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_quality() {
        let config = Config {
            relay_quality: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_auth_token_only_required_by_server() {
        std::env::remove_var("AUTH_TOKEN");
        let config = Config::from_env().unwrap();
        assert!(config.verify_token.is_empty());
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.validate_server(),
            Err(ConfigError::MissingEnvVar(name)) if name == "AUTH_TOKEN"
        ));

        std::env::set_var("AUTH_TOKEN", "hub-token");
        std::env::set_var("MAX_TRIES", "5");
        let config = Config::from_env().unwrap();
        assert_eq!(config.verify_token, "hub-token");
        assert_eq!(config.max_tries, 5);
        assert!(config.validate_server().is_ok());
        std::env::remove_var("AUTH_TOKEN");
        std::env::remove_var("MAX_TRIES");
    }
}
