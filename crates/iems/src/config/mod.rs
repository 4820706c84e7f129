use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::academics::attainment::{AggregationMethod, AttainmentSettings, ComponentWeights};
use crate::academics::marks::MarksPolicy;

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
    pub marks: MarksPolicy,
    pub attainment: AttainmentSettings,
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

        let marks = load_marks_policy()?;
        let attainment = load_attainment_settings()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            marks,
            attainment,
        })
    }
}

fn load_marks_policy() -> Result<MarksPolicy, ConfigError> {
    let edit_window_days = match env::var("MARKS_EDIT_WINDOW_DAYS") {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidEditWindow(raw))?,
        Err(_) => MarksPolicy::DEFAULT_EDIT_WINDOW_DAYS,
    };

    Ok(MarksPolicy { edit_window_days })
}

fn load_attainment_settings() -> Result<AttainmentSettings, ConfigError> {
    let defaults = AttainmentSettings::default();

    let method = match env::var("INTERNAL_CALCULATION_METHOD") {
        Ok(raw) => AggregationMethod::parse(&raw)
            .ok_or(ConfigError::InvalidCalculationMethod(raw))?,
        Err(_) => defaults.method,
    };

    let internal = weight_from_env("ATTAINMENT_INTERNAL_WEIGHT", defaults.weights.internal)?;
    let external = weight_from_env("ATTAINMENT_EXTERNAL_WEIGHT", defaults.weights.external)?;
    if internal + external <= 0.0 {
        return Err(ConfigError::ZeroComponentWeights);
    }

    let default_co_target = match env::var("DEFAULT_CO_TARGET") {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidTarget(raw.clone()))?;
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::InvalidTarget(raw));
            }
            value
        }
        Err(_) => defaults.default_co_target,
    };

    Ok(AttainmentSettings {
        method,
        weights: ComponentWeights { internal, external },
        default_co_target,
    })
}

fn weight_from_env(variable: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(variable) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidWeight { variable })?;
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { variable });
            }
            Ok(value)
        }
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
    InvalidEditWindow(String),
    InvalidCalculationMethod(String),
    InvalidWeight { variable: &'static str },
    ZeroComponentWeights,
    InvalidTarget(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEditWindow(raw) => write!(
                f,
                "MARKS_EDIT_WINDOW_DAYS must be a whole number of days (found '{raw}')"
            ),
            ConfigError::InvalidCalculationMethod(raw) => write!(
                f,
                "INTERNAL_CALCULATION_METHOD must be one of best, avg, weighted (found '{raw}')"
            ),
            ConfigError::InvalidWeight { variable } => {
                write!(f, "{variable} must be a non-negative number")
            }
            ConfigError::ZeroComponentWeights => write!(
                f,
                "ATTAINMENT_INTERNAL_WEIGHT and ATTAINMENT_EXTERNAL_WEIGHT cannot both be zero"
            ),
            ConfigError::InvalidTarget(raw) => write!(
                f,
                "DEFAULT_CO_TARGET must be a percentage between 0 and 100 (found '{raw}')"
            ),
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
        env::remove_var("MARKS_EDIT_WINDOW_DAYS");
        env::remove_var("INTERNAL_CALCULATION_METHOD");
        env::remove_var("ATTAINMENT_INTERNAL_WEIGHT");
        env::remove_var("ATTAINMENT_EXTERNAL_WEIGHT");
        env::remove_var("DEFAULT_CO_TARGET");
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
        assert_eq!(config.marks.edit_window_days, 7);
        assert_eq!(config.attainment.method, AggregationMethod::Average);
        assert!((config.attainment.weights.internal - 0.4).abs() < f64::EPSILON);
        assert!((config.attainment.weights.external - 0.6).abs() < f64::EPSILON);
        assert!((config.attainment.default_co_target - 70.0).abs() < f64::EPSILON);
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
    fn reads_marks_and_attainment_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKS_EDIT_WINDOW_DAYS", "14");
        env::set_var("INTERNAL_CALCULATION_METHOD", "best");
        env::set_var("DEFAULT_CO_TARGET", "65");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.marks.edit_window_days, 14);
        assert_eq!(config.attainment.method, AggregationMethod::Best);
        assert!((config.attainment.default_co_target - 65.0).abs() < f64::EPSILON);
        reset_env();
    }

    #[test]
    fn rejects_unknown_calculation_method() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("INTERNAL_CALCULATION_METHOD", "median");
        let error = AppConfig::load().expect_err("median is not supported");
        assert!(matches!(error, ConfigError::InvalidCalculationMethod(ref raw) if raw == "median"));
        reset_env();
    }

    #[test]
    fn rejects_zero_component_weights() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ATTAINMENT_INTERNAL_WEIGHT", "0");
        env::set_var("ATTAINMENT_EXTERNAL_WEIGHT", "0");
        let error = AppConfig::load().expect_err("weights cannot both be zero");
        assert!(matches!(error, ConfigError::ZeroComponentWeights));
        reset_env();
    }
}
