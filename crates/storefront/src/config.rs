//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults match the hosted product API.
//!
//! - `STOREFRONT_API_BASE_URL` - Product API base (default: `https://react-ecommerce-ajb4.onrender.com/api`)
//! - `STOREFRONT_API_TIMEOUT_SECS` - Per-request timeout (default: 60)
//! - `STOREFRONT_PRODUCT_CACHE_TTL_SECS` - Product detail cache TTL, 0 disables (default: 300)
//! - `STOREFRONT_CACHE_DIR` - Directory for the local cart cache (default: `.storefront`)
//! - `STOREFRONT_CART_COLLECTION` - Remote cart collection (default: `userCarts`)
//! - `STOREFRONT_WISHLIST_COLLECTION` - Remote wishlist collection (default: `wishlist`)
//! - `STOREFRONT_PROFILE_COLLECTION` - Remote profile collection (default: `users`)
//! - `STOREFRONT_AUTO_HYDRATE` - Re-hydrate the cart on every change (default: false)
//! - `STOREFRONT_LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default product API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://react-ecommerce-ajb4.onrender.com/api";

/// Upper bound on every product API call.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Product API configuration
    pub catalog: CatalogConfig,
    /// Remote document collection names
    pub collections: CollectionConfig,
    /// Directory backing the local cart cache
    pub cache_dir: PathBuf,
    /// Spawn a hydration after every cart change
    pub auto_hydrate: bool,
    /// Logging configuration
    pub log: LogConfig,
}

/// Remote product API configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL; endpoint paths are appended to it
    pub base_url: String,
    /// Upper bound on each request
    pub timeout: Duration,
    /// Product detail cache TTL (`Duration::ZERO` disables caching)
    pub product_cache_ttl: Duration,
}

/// Names of the per-user document collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    pub carts: String,
    pub wishlists: String,
    pub profiles: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            collections: CollectionConfig::default(),
            cache_dir: PathBuf::from(".storefront"),
            auto_hydrate: false,
            log: LogConfig::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_API_TIMEOUT,
            product_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            carts: "userCarts".to_string(),
            wishlists: "wishlist".to_string(),
            profiles: "users".to_string(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        Ok(Self {
            catalog: CatalogConfig::from_env()?,
            collections: CollectionConfig::from_env(),
            cache_dir: get_optional_env("STOREFRONT_CACHE_DIR")
                .map_or(defaults.cache_dir, PathBuf::from),
            auto_hydrate: parse_bool("STOREFRONT_AUTO_HYDRATE", defaults.auto_hydrate)?,
            log: LogConfig {
                format: parse_log_format(&get_env_or_default("STOREFRONT_LOG_FORMAT", "pretty"))?,
            },
        })
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_env_or_default("STOREFRONT_API_BASE_URL", DEFAULT_API_BASE_URL);
        parse_base_url(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_API_BASE_URL".to_string(), e))?;

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(parse_u64("STOREFRONT_API_TIMEOUT_SECS", 60)?),
            product_cache_ttl: Duration::from_secs(parse_u64(
                "STOREFRONT_PRODUCT_CACHE_TTL_SECS",
                300,
            )?),
        })
    }
}

impl CollectionConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            carts: get_env_or_default("STOREFRONT_CART_COLLECTION", &defaults.carts),
            wishlists: get_env_or_default("STOREFRONT_WISHLIST_COLLECTION", &defaults.wishlists),
            profiles: get_env_or_default("STOREFRONT_PROFILE_COLLECTION", &defaults.profiles),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL, requiring http(s) and a trailing slash so that
/// `Url::join` appends paths instead of replacing the last segment.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn parse_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = get_optional_env(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_LOG_FORMAT".to_string(),
            format!("expected 'pretty' or 'json', got '{other}'"),
        )),
    }
}
