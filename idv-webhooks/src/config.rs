//! Configuration module for environment variable parsing.
//!
//! Every setting is read once at startup into an explicit [`Config`] value
//! which is then handed to the components that need it.

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::scrub::{ScrubRule, Scrubbers};

/// Default vendor API root.
pub const DEFAULT_API_ROOT: &str = "https://id.amiqus.co/api/v2/";

/// Errors raised when the loaded configuration cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing AMIQUS_WEBHOOK_SECURITY_TOKEN (required unless AMIQUS_TEST_MODE is on)")]
    MissingWebhookToken,
    #[error("missing AMIQUS_ACCESS_TOKEN")]
    MissingAccessToken,
    #[error("invalid AMIQUS_API_ROOT {value:?}: {source}")]
    InvalidApiRoot {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the vendor REST API
    pub access_token: Option<String>,

    /// Shared secret used to sign webhook bodies
    pub webhook_security_token: Option<String>,

    /// Persist each successfully processed webhook event
    pub log_events: bool,

    /// Skip webhook signature verification (non-production only)
    pub test_mode: bool,

    /// Base URL of the vendor REST API
    pub api_root: String,

    /// Timeout in seconds for outbound API requests
    pub request_timeout_secs: u64,

    /// Port for the web server to listen on
    pub port: u16,

    /// Prefix under which the webhook route is mounted, e.g. "/amiqus"
    pub mount_path: String,

    /// Directory backing the resource store; memory only when unset
    pub data_dir: Option<PathBuf>,

    /// Client fields retained before local persistence
    pub client_scrub_keep: Vec<String>,

    /// Check fields removed before local persistence
    pub check_scrub_drop: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            access_token: None,
            webhook_security_token: None,
            log_events: true,
            test_mode: false,
            api_root: DEFAULT_API_ROOT.to_string(),
            request_timeout_secs: 30,
            port: 8080,
            mount_path: String::new(),
            data_dir: None,
            client_scrub_keep: vec!["id".into(), "status".into(), "created_at".into()],
            check_scrub_drop: vec!["email".into()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            access_token: non_empty("AMIQUS_ACCESS_TOKEN"),

            webhook_security_token: non_empty("AMIQUS_WEBHOOK_SECURITY_TOKEN"),

            log_events: parse_bool("AMIQUS_LOG_EVENTS", defaults.log_events),

            test_mode: parse_bool("AMIQUS_TEST_MODE", defaults.test_mode),

            api_root: non_empty("AMIQUS_API_ROOT").unwrap_or(defaults.api_root),

            request_timeout_secs: env::var("DEFAULT_REQUESTS_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),

            mount_path: non_empty("AMIQUS_MOUNT_PATH").unwrap_or(defaults.mount_path),

            data_dir: non_empty("AMIQUS_DATA_DIR").map(PathBuf::from),

            client_scrub_keep: parse_csv("AMIQUS_CLIENT_SCRUB_KEEP")
                .unwrap_or(defaults.client_scrub_keep),

            check_scrub_drop: parse_csv("AMIQUS_CHECK_SCRUB_DROP")
                .unwrap_or(defaults.check_scrub_drop),
        }
    }

    /// Check the settings the webhook endpoint cannot run without.
    ///
    /// With test mode off a missing webhook token is fatal: accepting every
    /// request unsigned is never the fallback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.test_mode && self.webhook_security_token.is_none() {
            return Err(ConfigError::MissingWebhookToken);
        }
        url::Url::parse(&self.api_root).map_err(|source| ConfigError::InvalidApiRoot {
            value: self.api_root.clone(),
            source,
        })?;
        Ok(())
    }

    /// Access token for callers that cannot work without the remote API.
    pub fn require_access_token(&self) -> Result<&str, ConfigError> {
        self.access_token
            .as_deref()
            .ok_or(ConfigError::MissingAccessToken)
    }

    /// Scrubber rules derived from the keep/drop lists.
    pub fn scrubbers(&self) -> Scrubbers {
        Scrubbers {
            client: ScrubRule::Keep(self.client_scrub_keep.clone()),
            check: ScrubRule::Drop(self.check_scrub_drop.clone()),
        }
    }

    /// Full path of the webhook route.
    pub fn webhook_path(&self) -> String {
        match self.mount_path.trim_matches('/') {
            "" => "/webhook/".to_string(),
            mount => format!("/{mount}/webhook/"),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean flag, falling back to the default on unrecognised values.
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_values() {
        env::set_var("TEST_IDV_BOOL", "yes");
        assert!(parse_bool("TEST_IDV_BOOL", false));
        env::set_var("TEST_IDV_BOOL", "OFF");
        assert!(!parse_bool("TEST_IDV_BOOL", true));
        env::set_var("TEST_IDV_BOOL", "maybe");
        assert!(parse_bool("TEST_IDV_BOOL", true));
        env::remove_var("TEST_IDV_BOOL");
    }

    #[test]
    fn test_parse_bool_default() {
        assert!(parse_bool("NONEXISTENT_IDV_BOOL", true));
        assert!(!parse_bool("NONEXISTENT_IDV_BOOL", false));
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_IDV_CSV", "id, status, ,created_at");
        let result = parse_csv("TEST_IDV_CSV");
        assert_eq!(
            result,
            Some(vec!["id".to_string(), "status".to_string(), "created_at".to_string()])
        );
        env::remove_var("TEST_IDV_CSV");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_root, "https://id.amiqus.co/api/v2/");
        assert!(config.log_events);
        assert!(!config.test_mode);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.webhook_path(), "/webhook/");
    }

    #[test]
    fn test_validate_requires_token_outside_test_mode() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingWebhookToken)));

        let config = Config {
            test_mode: true,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let config = Config {
            webhook_security_token: Some("secret".into()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_api_root() {
        let config = Config {
            test_mode: true,
            api_root: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidApiRoot { .. })));
    }

    #[test]
    fn test_webhook_path_with_mount() {
        let config = Config {
            mount_path: "/amiqus".into(),
            ..Config::default()
        };
        assert_eq!(config.webhook_path(), "/amiqus/webhook/");

        let config = Config {
            mount_path: "amiqus/".into(),
            ..Config::default()
        };
        assert_eq!(config.webhook_path(), "/amiqus/webhook/");
    }
}
