//! Runtime configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::http_provider::DEFAULT_PROVIDER_URL;

pub const DEFAULT_DB_PATH: &str = "grimoire.db";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 500;
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("Could not load filter aliases from {path}: {message}")]
    Aliases { path: PathBuf, message: String },
}

/// Everything the binary needs to assemble the service.
#[derive(Debug, Clone, PartialEq)]
pub struct GrimoireConfig {
    pub db_path: PathBuf,
    pub provider_url: String,
    pub provider_timeout: Duration,
    pub page_size: u32,
    pub max_pages: u32,
    /// Upper bound on one fetch's remote branch. `None` waits for the drain.
    pub fetch_deadline: Option<Duration>,
    /// Dump directory imported at startup, if any.
    pub import_dir: Option<PathBuf>,
    pub import_batch_size: usize,
    pub aliases_path: Option<PathBuf>,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for GrimoireConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            fetch_deadline: None,
            import_dir: None,
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            aliases_path: None,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl GrimoireConfig {
    /// Read configuration from the process environment.
    ///
    /// Unset or empty variables fall back to defaults; set but unparseable
    /// numbers are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            db_path: get("GRIMOIRE_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            provider_url: get("GRIMOIRE_PROVIDER_URL").unwrap_or(defaults.provider_url),
            provider_timeout: parse(get("GRIMOIRE_PROVIDER_TIMEOUT_SECS"), "GRIMOIRE_PROVIDER_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            page_size: parse(get("GRIMOIRE_PAGE_SIZE"), "GRIMOIRE_PAGE_SIZE")?
                .unwrap_or(defaults.page_size),
            max_pages: parse(get("GRIMOIRE_MAX_PAGES"), "GRIMOIRE_MAX_PAGES")?
                .unwrap_or(defaults.max_pages),
            fetch_deadline: parse(get("GRIMOIRE_FETCH_DEADLINE_MS"), "GRIMOIRE_FETCH_DEADLINE_MS")?
                .map(Duration::from_millis),
            import_dir: get("GRIMOIRE_IMPORT_DIR").map(PathBuf::from),
            import_batch_size: parse(get("GRIMOIRE_IMPORT_BATCH_SIZE"), "GRIMOIRE_IMPORT_BATCH_SIZE")?
                .unwrap_or(defaults.import_batch_size),
            aliases_path: get("GRIMOIRE_ALIASES").map(PathBuf::from),
            server_host: get("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse(get("SERVER_PORT").or_else(|| get("PORT")), "SERVER_PORT")?
                .unwrap_or(defaults.server_port),
        })
    }
}

fn parse<T: std::str::FromStr>(
    value: Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| v.parse::<T>().map_err(|_| ConfigError::Invalid { var, value: v.clone() }))
        .transpose()
}
