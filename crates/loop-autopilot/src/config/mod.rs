use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::interview_loop::SchedulingPolicy;

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
    /// Base policy applied to every solve before request overrides.
    pub solver: SchedulingPolicy,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            solver: load_solver_policy()?,
        })
    }
}

fn load_solver_policy() -> Result<SchedulingPolicy, ConfigError> {
    let defaults = SchedulingPolicy::default();

    let policy = SchedulingPolicy {
        slot_granularity_minutes: parse_var(
            "LOOP_SLOT_GRANULARITY_MINUTES",
            defaults.slot_granularity_minutes,
        )?,
        enforce_business_hours: parse_flag(
            "LOOP_ENFORCE_BUSINESS_HOURS",
            defaults.enforce_business_hours,
        )?,
        max_days_span: parse_var("LOOP_MAX_DAYS_SPAN", defaults.max_days_span)?,
        solver_timeout_ms: parse_var("LOOP_SOLVER_TIMEOUT_MS", defaults.solver_timeout_ms)?,
        max_search_iterations: parse_var(
            "LOOP_MAX_SEARCH_ITERATIONS",
            defaults.max_search_iterations,
        )?,
        max_solutions_to_return: parse_var(
            "LOOP_MAX_SOLUTIONS",
            defaults.max_solutions_to_return,
        )?,
        prefer_single_day: parse_flag("LOOP_PREFER_SINGLE_DAY", defaults.prefer_single_day)?,
        reject_existing_booking_conflicts: parse_flag(
            "LOOP_REJECT_BOOKING_CONFLICTS",
            defaults.reject_existing_booking_conflicts,
        )?,
    };

    if policy.slot_granularity_minutes == 0 {
        return Err(ConfigError::InvalidValue {
            variable: "LOOP_SLOT_GRANULARITY_MINUTES",
            value: "0".to_string(),
        });
    }

    Ok(policy)
}

fn parse_var<T: FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue {
                variable,
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(variable: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(variable) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            variable,
            value: raw,
        }),
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
    InvalidValue {
        variable: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "{variable} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    const SOLVER_VARS: [&str; 8] = [
        "LOOP_SLOT_GRANULARITY_MINUTES",
        "LOOP_ENFORCE_BUSINESS_HOURS",
        "LOOP_MAX_DAYS_SPAN",
        "LOOP_SOLVER_TIMEOUT_MS",
        "LOOP_MAX_SEARCH_ITERATIONS",
        "LOOP_MAX_SOLUTIONS",
        "LOOP_PREFER_SINGLE_DAY",
        "LOOP_REJECT_BOOKING_CONFLICTS",
    ];

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        for var in SOLVER_VARS {
            env::remove_var(var);
        }
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
        assert_eq!(config.solver, SchedulingPolicy::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn solver_policy_reads_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LOOP_SLOT_GRANULARITY_MINUTES", "30");
        env::set_var("LOOP_PREFER_SINGLE_DAY", "no");
        env::set_var("LOOP_REJECT_BOOKING_CONFLICTS", "1");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.solver.slot_granularity_minutes, 30);
        assert!(!config.solver.prefer_single_day);
        assert!(config.solver.reject_existing_booking_conflicts);
        reset_env();
    }

    #[test]
    fn solver_policy_rejects_invalid_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LOOP_MAX_DAYS_SPAN", "several");

        match AppConfig::load() {
            Err(ConfigError::InvalidValue { variable, value }) => {
                assert_eq!(variable, "LOOP_MAX_DAYS_SPAN");
                assert_eq!(value, "several");
            }
            other => panic!("expected invalid value error, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn zero_granularity_is_rejected() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LOOP_SLOT_GRANULARITY_MINUTES", "0");

        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidValue {
                variable: "LOOP_SLOT_GRANULARITY_MINUTES",
                ..
            })
        ));
        reset_env();
    }
}
