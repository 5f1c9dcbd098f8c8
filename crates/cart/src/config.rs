//! Cart client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_BASE_URL` - Base URL of the remote cart service (http or https)
//!
//! ## Optional
//! - `CART_API_TOKEN` - Bearer token sent with every cart request
//! - `CART_API_TIMEOUT_SECS` - Per-request timeout (default: none)
//! - `CART_CURRENCY` - ISO 4217 currency used to display totals (default: USD)

use std::time::Duration;

use marketplace_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Remote cart service configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct CartConfig {
    /// Base URL of the remote cart service
    pub base_url: Url,
    /// Bearer token for the cart service
    pub api_token: Option<SecretString>,
    /// Per-request timeout; `None` lets requests run to completion
    pub timeout: Option<Duration>,
    /// Currency used to display totals
    pub currency: CurrencyCode,
}

impl std::fmt::Debug for CartConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("currency", &self.currency)
            .finish()
    }
}

impl CartConfig {
    /// Build a configuration for the given base URL with defaults elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("CART_API_BASE_URL", base_url)?,
            api_token: None,
            timeout: None,
            currency: CurrencyCode::default(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(
            "CART_API_BASE_URL",
            &get_required_env("CART_API_BASE_URL")?,
        )?;

        let api_token = get_optional_env("CART_API_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "CART_API_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;

        let timeout = get_optional_env("CART_API_TIMEOUT_SECS")
            .map(|secs| parse_timeout("CART_API_TIMEOUT_SECS", &secs))
            .transpose()?;

        let currency = get_env_or_default("CART_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_CURRENCY".to_string(), e.to_string()))?;

        Ok(Self {
            base_url,
            api_token,
            timeout,
            currency,
        })
    }

    /// Expose the bearer token, if configured.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.api_token.as_ref().map(|token| token.expose_secret())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse and validate the service base URL.
///
/// A trailing slash is ensured so relative joins keep the full path.
fn parse_base_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Parse a positive timeout in whole seconds.
fn parse_timeout(var_name: &str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            e.to_string(),
        )),
    }
}

/// Reject tokens that are obviously copied from a template.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("X", "https://api.example.com/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/");
        assert_eq!(url.join("cart/u1").unwrap().path(), "/v1/cart/u1");
    }

    #[test]
    fn test_base_url_rejects_other_schemes() {
        let err = parse_base_url("X", "ftp://files.example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        assert!(parse_base_url("X", "not a url").is_err());
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("T", "30").unwrap(), Duration::from_secs(30));
        assert!(parse_timeout("T", "0").is_err());
        assert!(parse_timeout("T", "soon").is_err());
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let result = validate_secret_strength("your-api-token", "CART_API_TOKEN");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_real_token_accepted() {
        assert!(validate_secret_strength("k7Qm2vX9pL4tR8wZ", "CART_API_TOKEN").is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = CartConfig::new("http://localhost:8080").unwrap();
        config.api_token = Some(SecretString::from("k7Qm2vX9pL4tR8wZ"));
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("k7Qm2vX9pL4tR8wZ"));
    }
}
