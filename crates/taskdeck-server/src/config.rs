//! Server configuration loaded from environment variables.
//!
//! Every setting has a development default so the server starts with zero
//! configuration. Production is stricter: a real session secret and a
//! database URL are required. All problems are collected and reported
//! together instead of failing on the first one.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use rand::RngCore;
use thiserror::Error;

use taskdeck_shared::constants::DEFAULT_HTTP_PORT;

/// Minimum length of `SESSION_SECRET` in production.
const MIN_SECRET_LEN: usize = 32;

/// Database used when the relational backend is selected outside production
/// without an explicit `DATABASE_URL`.
const DEV_DATABASE_URL: &str = "sqlite://taskdeck.db";

/// Upper bounds that keep derived deadlines within `Instant` range.
const MAX_SESSION_TTL_HOURS: u64 = 24 * 366;
const MAX_DB_BUSY_TIMEOUT_MS: u64 = 10 * 60 * 1000;
const MAX_RATE_LIMIT_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

impl AppEnv {
    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Test => "test",
            AppEnv::Production => "production",
        }
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(AppEnv::Development),
            "test" => Ok(AppEnv::Test),
            "production" => Ok(AppEnv::Production),
            other => Err(format!(
                "APP_ENV must be development, test or production (got {other:?})"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!(
                "STORAGE_BACKEND must be memory or sqlite (got {other:?})"
            )),
        }
    }
}

/// Allowed CORS origin. `Any` disables credentialed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    Any,
    Exact(HeaderValue),
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Env: `APP_ENV`. Default: `development`.
    pub app_env: AppEnv,

    /// Env: `HOST` and `PORT`. Default: `0.0.0.0:3000`.
    pub http_addr: SocketAddr,

    /// Key material for signing session cookies.
    /// Env: `SESSION_SECRET`. Default: random per process (non-production).
    pub session_secret: String,

    /// Env: `SESSION_TTL_HOURS`. Default: 24 hours.
    pub session_ttl: Duration,

    /// Env: `DATABASE_URL`. Required in production.
    pub database_url: Option<String>,

    /// Env: `STORAGE_BACKEND`. Default: `sqlite` in production, else `memory`.
    pub storage_backend: StorageBackend,

    /// Env: `DB_BUSY_TIMEOUT_MS`. Default: 5 seconds.
    pub db_busy_timeout: Duration,

    /// Env: `CORS_ORIGIN`. Default: `http://localhost:5173`.
    pub cors_origin: CorsOrigin,

    /// Env: `RATE_LIMIT_WINDOW_MS`. Default: 15 minutes.
    pub rate_limit_window: Duration,

    /// Requests allowed per window and client IP.
    /// Env: `RATE_LIMIT_MAX`. Default: 100.
    pub rate_limit_max: u32,

    /// Env: `BCRYPT_COST`. Default: 12.
    pub bcrypt_cost: u32,

    /// Fallback filter directive when `RUST_LOG` is unset.
    /// Env: `LOG_LEVEL`. Default: `info`.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_env: AppEnv::Development,
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            session_secret: random_secret(),
            session_ttl: Duration::from_secs(24 * 3600),
            database_url: None,
            storage_backend: StorageBackend::Memory,
            db_busy_timeout: Duration::from_millis(5000),
            cors_origin: CorsOrigin::Exact(HeaderValue::from_static("http://localhost:5173")),
            rate_limit_window: Duration::from_millis(900_000),
            rate_limit_max: 100,
            bcrypt_cost: 12,
            log_level: "info".to_string(),
        }
    }
}

// The secret never goes to the logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("app_env", &self.app_env)
            .field("http_addr", &self.http_addr)
            .field("session_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("database_url", &self.database_url)
            .field("storage_backend", &self.storage_backend)
            .field("db_busy_timeout", &self.db_busy_timeout)
            .field("cors_origin", &self.cors_origin)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut issues = Vec::new();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(env) = var("APP_ENV") {
            match env.parse() {
                Ok(env) => config.app_env = env,
                Err(e) => issues.push(e),
            }
        }
        let production = config.app_env.is_production();

        let mut host: IpAddr = config.http_addr.ip();
        if let Some(value) = var("HOST") {
            match value.parse() {
                Ok(ip) => host = ip,
                Err(_) => issues.push(format!("HOST must be an IP address (got {value:?})")),
            }
        }
        let port = parse(&var, "PORT", &mut issues).unwrap_or(config.http_addr.port());
        config.http_addr = SocketAddr::new(host, port);

        match var("SESSION_SECRET") {
            Some(secret) if production && secret.len() < MIN_SECRET_LEN => issues.push(format!(
                "SESSION_SECRET must be at least {MIN_SECRET_LEN} characters in production"
            )),
            Some(secret) => config.session_secret = secret,
            None if production => {
                issues.push("SESSION_SECRET is required in production".to_string())
            }
            None => {}
        }

        let ttl_hours = bounded(&var, "SESSION_TTL_HOURS", MAX_SESSION_TTL_HOURS, &mut issues);
        if let Some(hours) = ttl_hours {
            config.session_ttl = Duration::from_secs(hours * 3600);
        }

        config.storage_backend = if production {
            StorageBackend::Sqlite
        } else {
            StorageBackend::Memory
        };
        if let Some(backend) = var("STORAGE_BACKEND") {
            match backend.parse() {
                Ok(backend) => config.storage_backend = backend,
                Err(e) => issues.push(e),
            }
        }

        config.database_url = var("DATABASE_URL");
        if config.database_url.is_none() {
            if production {
                issues.push("DATABASE_URL is required in production".to_string());
            } else if config.storage_backend == StorageBackend::Sqlite {
                config.database_url = Some(DEV_DATABASE_URL.to_string());
            }
        }

        let busy_ms = bounded(&var, "DB_BUSY_TIMEOUT_MS", MAX_DB_BUSY_TIMEOUT_MS, &mut issues);
        if let Some(ms) = busy_ms {
            config.db_busy_timeout = Duration::from_millis(ms);
        }

        if let Some(origin) = var("CORS_ORIGIN") {
            if origin == "*" {
                config.cors_origin = CorsOrigin::Any;
            } else {
                match HeaderValue::from_str(&origin) {
                    Ok(value) => config.cors_origin = CorsOrigin::Exact(value),
                    Err(_) => issues.push(format!("CORS_ORIGIN is not a valid origin ({origin:?})")),
                }
            }
        }

        let window_ms = bounded(&var, "RATE_LIMIT_WINDOW_MS", MAX_RATE_LIMIT_WINDOW_MS, &mut issues);
        if let Some(ms) = window_ms {
            config.rate_limit_window = Duration::from_millis(ms);
        }
        if let Some(max) = positive::<u32>(&var, "RATE_LIMIT_MAX", &mut issues) {
            config.rate_limit_max = max;
        }

        if let Some(cost) = parse::<u32>(&var, "BCRYPT_COST", &mut issues) {
            if (4..=31).contains(&cost) {
                config.bcrypt_cost = cost;
            } else {
                issues.push(format!("BCRYPT_COST must be between 4 and 31 (got {cost})"));
            }
        }

        if let Some(level) = var("LOG_LEVEL") {
            config.log_level = level;
        }

        if issues.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<T> {
    let value = var(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            issues.push(format!("{key} is not a valid number (got {value:?})"));
            None
        }
    }
}

fn positive<T: FromStr + Default + PartialEq>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<T> {
    let value = parse::<T>(var, key, issues)?;
    if value == T::default() {
        issues.push(format!("{key} must be greater than zero"));
        return None;
    }
    Some(value)
}

fn bounded(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    max: u64,
    issues: &mut Vec<String>,
) -> Option<u64> {
    let value = positive::<u64>(var, key, issues)?;
    if value > max {
        issues.push(format!("{key} must be at most {max} (got {value})"));
        return None;
    }
    Some(value)
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    fn issues(pairs: &[(&str, &str)]) -> Vec<String> {
        match load(pairs) {
            Err(ConfigError::Invalid(issues)) => issues,
            Ok(_) => panic!("expected configuration to be rejected"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]).unwrap();
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.session_ttl, Duration::from_secs(86_400));
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.bcrypt_cost, 12);
        assert_eq!(config.session_secret.len(), 64);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("SESSION_TTL_HOURS", "2"),
            ("CORS_ORIGIN", "*"),
            ("RATE_LIMIT_WINDOW_MS", "1000"),
            ("RATE_LIMIT_MAX", "5"),
            ("BCRYPT_COST", "4"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 8081).into());
        assert_eq!(config.session_ttl, Duration::from_secs(7200));
        assert_eq!(config.cors_origin, CorsOrigin::Any);
        assert_eq!(config.rate_limit_window, Duration::from_secs(1));
        assert_eq!(config.rate_limit_max, 5);
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_production_requires_secret_and_database() {
        let problems = issues(&[("APP_ENV", "production")]);
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].contains("SESSION_SECRET"));
        assert!(problems[1].contains("DATABASE_URL"));
    }

    #[test]
    fn test_production_rejects_short_secret() {
        let problems = issues(&[
            ("APP_ENV", "production"),
            ("SESSION_SECRET", "too-short"),
            ("DATABASE_URL", "sqlite://prod.db"),
        ]);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("at least 32"));
    }

    #[test]
    fn test_production_defaults_to_sqlite() {
        let secret = "s".repeat(40);
        let config = load(&[
            ("APP_ENV", "production"),
            ("SESSION_SECRET", secret.as_str()),
            ("DATABASE_URL", "sqlite://prod.db"),
        ])
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Sqlite);
        assert_eq!(config.database_url.as_deref(), Some("sqlite://prod.db"));
    }

    #[test]
    fn test_sqlite_in_development_gets_default_url() {
        let config = load(&[("STORAGE_BACKEND", "sqlite")]).unwrap();
        assert_eq!(config.database_url.as_deref(), Some(DEV_DATABASE_URL));
    }

    #[test]
    fn test_all_problems_collected() {
        let problems = issues(&[
            ("APP_ENV", "staging"),
            ("PORT", "eighty"),
            ("STORAGE_BACKEND", "postgres"),
            ("RATE_LIMIT_MAX", "0"),
            ("BCRYPT_COST", "40"),
        ]);
        assert_eq!(problems.len(), 5, "{problems:?}");
    }

    #[test]
    fn test_durations_are_capped() {
        let problems = issues(&[
            ("SESSION_TTL_HOURS", "5000000000000000"),
            ("DB_BUSY_TIMEOUT_MS", "18446744073709551615"),
            ("RATE_LIMIT_WINDOW_MS", "86400001"),
        ]);
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems[0].starts_with("SESSION_TTL_HOURS must be at most"));

        let config = load(&[("SESSION_TTL_HOURS", "8784")]).unwrap();
        assert_eq!(config.session_ttl, Duration::from_secs(8784 * 3600));
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = load(&[("SESSION_SECRET", "hunter2-hunter2-hunter2-hunter2-x")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
