use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration as StdDuration;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::pipeline::scoring::ScoringConfig;
use crate::pipeline::settlement::SettlementConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
}

/// Knobs for the scoring and settlement batch jobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scoring: ScoringConfig,
    pub settlement: SettlementConfig,
    /// Items scored longer ago than this are due for a rescore.
    pub rescore_interval: Duration,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let scoring = ScoringConfig {
            decay_window: Duration::hours(int_var("DECAY_WINDOW_HOURS", 168)?),
            decay_floor: decimal_var("DECAY_FLOOR", "0.5")?,
            ..ScoringConfig::default()
        };

        let settlement = SettlementConfig {
            pool: decimal_var("REWARD_POOL_SIZE", "1")?,
            fee_percent: decimal_var("FEE_PERCENT", "5")?,
            fee_destination: env::var("FEE_DESTINATION").unwrap_or_default(),
            period: Duration::minutes(int_var("SETTLEMENT_PERIOD_MINUTES", 10)?),
            dispatch_timeout: StdDuration::from_secs(
                int_var("DISPATCH_TIMEOUT_SECS", 30)? as u64
            ),
        };

        let pipeline = PipelineConfig {
            scoring,
            settlement,
            rescore_interval: Duration::minutes(int_var("RESCORE_INTERVAL_MINUTES", 10)?),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline,
        })
    }
}

fn decimal_var(key: &'static str, default: &str) -> Result<Decimal, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| ConfigError::InvalidDecimal { key })
}

fn int_var(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidInteger { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDecimal { key: &'static str },
    InvalidInteger { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDecimal { key } => {
                write!(f, "{key} must be a decimal number")
            }
            ConfigError::InvalidInteger { key } => {
                write!(f, "{key} must be an integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("REWARD_POOL_SIZE");
        env::remove_var("FEE_PERCENT");
        env::remove_var("FEE_DESTINATION");
        env::remove_var("RESCORE_INTERVAL_MINUTES");
        env::remove_var("SETTLEMENT_PERIOD_MINUTES");
        env::remove_var("DECAY_WINDOW_HOURS");
        env::remove_var("DECAY_FLOOR");
        env::remove_var("DISPATCH_TIMEOUT_SECS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.pipeline.settlement.pool, Decimal::ONE);
        assert_eq!(config.pipeline.settlement.fee_percent, Decimal::from(5));
        assert_eq!(config.pipeline.rescore_interval, Duration::minutes(10));
        assert_eq!(config.pipeline.scoring.decay_window, Duration::hours(168));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn rejects_malformed_pool_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("REWARD_POOL_SIZE", "one sol");
        match AppConfig::load() {
            Err(ConfigError::InvalidDecimal {
                key: "REWARD_POOL_SIZE",
            }) => {}
            other => panic!("expected decimal error, got {other:?}"),
        }
    }

    #[test]
    fn reads_settlement_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("REWARD_POOL_SIZE", "250.5");
        env::set_var("FEE_PERCENT", "2.5");
        env::set_var("FEE_DESTINATION", "fee-wallet");
        env::set_var("RESCORE_INTERVAL_MINUTES", "30");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.pipeline.settlement.pool,
            "250.5".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            config.pipeline.settlement.fee_percent,
            "2.5".parse::<Decimal>().unwrap()
        );
        assert_eq!(config.pipeline.settlement.fee_destination, "fee-wallet");
        assert_eq!(config.pipeline.rescore_interval, Duration::minutes(30));
    }
}
