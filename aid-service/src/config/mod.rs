use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Longest accepted session validity and TTL (30 days).
pub const MAX_SESSION_MINUTES: i64 = 30 * 24 * 60;

/// Longest accepted notification retention (10 years).
pub const MAX_RETENTION_HOURS: i64 = 10 * 365 * 24;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub sessions: SessionConfig,
    pub reapers: ReaperConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionBackend {
    Memory,
    Redis,
}

#[derive(Clone)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub redis_url: Option<String>,
    /// HMAC secret for session tokens; loaded once at startup.
    pub signing_secret: String,
    pub validity_minutes: i64,
    /// How far `nbf` is backdated from `iat` to absorb clock skew.
    pub skew_seconds: i64,
    /// Session entry lifetime, independent of the token's own `exp`.
    pub ttl_minutes: i64,
    pub sweep_interval_seconds: u64,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("backend", &self.backend)
            .field("redis_url", &self.redis_url)
            .field("signing_secret", &"[redacted]")
            .field("validity_minutes", &self.validity_minutes)
            .field("skew_seconds", &self.skew_seconds)
            .field("ttl_minutes", &self.ttl_minutes)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .finish()
    }
}

impl SessionConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.clamp(0, MAX_SESSION_MINUTES) as u64 * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub batch_size: usize,
    pub offer_interval_seconds: u64,
    pub request_interval_seconds: u64,
    pub notification_interval_seconds: u64,
    pub notification_retention_hours: i64,
}

impl ReaperConfig {
    pub fn offer_interval(&self) -> Duration {
        Duration::from_secs(self.offer_interval_seconds)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_seconds)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_seconds)
    }

    pub fn notification_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.notification_retention_hours.clamp(0, MAX_RETENTION_HOURS))
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment: Environment = get_env("ENVIRONMENT", Some("dev"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let validity_minutes: i64 = parse_env("SESSION_VALIDITY_MINUTES", Some("60"), is_prod)?;

        let config = AppConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("aid-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
            },
            sessions: SessionConfig {
                backend: get_env("SESSION_BACKEND", Some("memory"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
                signing_secret: get_env("SESSION_SIGNING_SECRET", None, is_prod)?,
                validity_minutes,
                skew_seconds: parse_env("SESSION_SKEW_SECONDS", Some("30"), is_prod)?,
                ttl_minutes: match env::var("SESSION_TTL_MINUTES") {
                    Ok(val) => val.parse().map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!("SESSION_TTL_MINUTES: {}", e))
                    })?,
                    Err(_) => validity_minutes,
                },
                sweep_interval_seconds: parse_env(
                    "SESSION_SWEEP_INTERVAL_SECONDS",
                    Some("300"),
                    is_prod,
                )?,
            },
            reapers: ReaperConfig {
                batch_size: parse_env("REAPER_BATCH_SIZE", Some("10"), is_prod)?,
                offer_interval_seconds: parse_env(
                    "REAPER_OFFER_INTERVAL_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                request_interval_seconds: parse_env(
                    "REAPER_REQUEST_INTERVAL_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                notification_interval_seconds: parse_env(
                    "REAPER_NOTIFICATION_INTERVAL_SECONDS",
                    Some("3600"),
                    is_prod,
                )?,
                notification_retention_hours: parse_env(
                    "NOTIFICATION_RETENTION_HOURS",
                    Some("168"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.sessions.signing_secret.is_empty() {
            return Err(config_error("SESSION_SIGNING_SECRET must not be empty"));
        }

        if !(1..=MAX_SESSION_MINUTES).contains(&self.sessions.validity_minutes) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_VALIDITY_MINUTES must be between 1 and {}",
                MAX_SESSION_MINUTES
            )));
        }

        if !(1..=MAX_SESSION_MINUTES).contains(&self.sessions.ttl_minutes) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_MINUTES must be between 1 and {}",
                MAX_SESSION_MINUTES
            )));
        }

        if self.sessions.skew_seconds > MAX_SESSION_MINUTES * 60 {
            return Err(config_error("SESSION_SKEW_SECONDS is out of range"));
        }

        if self.sessions.skew_seconds < 0 {
            return Err(config_error("SESSION_SKEW_SECONDS must not be negative"));
        }

        if self.sessions.backend == SessionBackend::Redis && self.sessions.redis_url.is_none() {
            return Err(config_error("REDIS_URL is required when SESSION_BACKEND=redis"));
        }

        if self.reapers.batch_size == 0 {
            return Err(config_error("REAPER_BATCH_SIZE must be greater than 0"));
        }

        if self.reapers.offer_interval_seconds == 0
            || self.reapers.request_interval_seconds == 0
            || self.reapers.notification_interval_seconds == 0
            || self.sessions.sweep_interval_seconds == 0
        {
            return Err(config_error("Worker intervals must be greater than 0"));
        }

        if !(0..=MAX_RETENTION_HOURS).contains(&self.reapers.notification_retention_hours) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "NOTIFICATION_RETENTION_HOURS must be between 0 and {}",
                MAX_RETENTION_HOURS
            )));
        }

        if self.environment == Environment::Prod && self.sessions.signing_secret.len() < 32 {
            return Err(config_error(
                "SESSION_SIGNING_SECRET must be at least 32 bytes in production",
            ));
        }

        Ok(())
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get_env(key, default, is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(SessionBackend::Memory),
            "redis" => Ok(SessionBackend::Redis),
            _ => Err(format!("Invalid session backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn valid_config() -> AppConfig {
        AppConfig {
            common: core_config::Config {
                port: 8080,
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            },
            environment: Environment::Dev,
            service_name: "aid-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/aid".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            sessions: SessionConfig {
                backend: SessionBackend::Memory,
                redis_url: None,
                signing_secret: "dev-secret".to_string(),
                validity_minutes: 60,
                skew_seconds: 30,
                ttl_minutes: 60,
                sweep_interval_seconds: 300,
            },
            reapers: ReaperConfig {
                batch_size: 10,
                offer_interval_seconds: 60,
                request_interval_seconds: 60,
                notification_interval_seconds: 3600,
                notification_retention_hours: 168,
            },
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut config = valid_config();
        config.reapers.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_session_windows_beyond_limit() {
        let mut config = valid_config();
        config.sessions.validity_minutes = 1_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.sessions.ttl_minutes = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.sessions.validity_minutes = MAX_SESSION_MINUTES;
        config.sessions.ttl_minutes = MAX_SESSION_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let mut config = valid_config();
        config.sessions.ttl_minutes = i64::MAX;
        assert_eq!(
            config.sessions.session_ttl(),
            Duration::from_secs(MAX_SESSION_MINUTES as u64 * 60)
        );
    }

    #[test]
    fn rejects_retention_beyond_limit() {
        let mut config = valid_config();
        config.reapers.notification_retention_hours = 100_000_000_000;
        assert!(config.validate().is_err());
        assert_eq!(
            config.reapers.notification_retention(),
            chrono::Duration::hours(MAX_RETENTION_HOURS)
        );
    }

    #[test]
    fn redis_backend_requires_url() {
        let mut config = valid_config();
        config.sessions.backend = SessionBackend::Redis;
        assert!(config.validate().is_err());

        config.sessions.redis_url = Some("redis://localhost:6379".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_requires_long_secret() {
        let mut config = valid_config();
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());

        config.sessions.signing_secret = "x".repeat(32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", valid_config().sessions);
        assert!(!rendered.contains("dev-secret"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn parses_session_backend() {
        assert_eq!("Redis".parse::<SessionBackend>(), Ok(SessionBackend::Redis));
        assert!("memcached".parse::<SessionBackend>().is_err());
    }
}
