use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::common::Role;

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
    pub auth: AuthConfig,
    pub scheduler: SchedulerConfig,
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

        let cron_secret = env::var("CRON_SECRET")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let api_tokens = match env::var("API_TOKENS") {
            Ok(raw) => parse_api_tokens(&raw)?,
            Err(_) => Vec::new(),
        };

        let scheduler_enabled = match env::var("SCHEDULER_ENABLED") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                name: "SCHEDULER_ENABLED",
            })?,
            Err(_) => environment != AppEnvironment::Test,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: environment != AppEnvironment::Production,
            },
            auth: AuthConfig {
                cron_secret,
                api_tokens,
            },
            scheduler: SchedulerConfig {
                enabled: scheduler_enabled,
            },
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

/// Static bearer tokens accepted by the identity adapter.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub cron_secret: Option<String>,
    pub api_tokens: Vec<ApiToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    pub token: String,
    pub principal_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub enabled: bool,
}

/// Parses `token=principal:role` entries separated by commas.
fn parse_api_tokens(raw: &str) -> Result<Vec<ApiToken>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidApiToken {
                entry: entry.to_string(),
            };
            let (token, identity) = entry.split_once('=').ok_or_else(invalid)?;
            let (principal_id, role) = identity.split_once(':').ok_or_else(invalid)?;
            let role = role.trim().parse::<Role>().map_err(|_| invalid())?;
            if token.trim().is_empty() || principal_id.trim().is_empty() {
                return Err(invalid());
            }
            Ok(ApiToken {
                token: token.trim().to_string(),
                principal_id: principal_id.trim().to_string(),
                role,
            })
        })
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidApiToken { entry: String },
    InvalidFlag { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidApiToken { entry } => {
                write!(f, "API_TOKENS entry '{entry}' must look like token=id:role")
            }
            ConfigError::InvalidFlag { name } => write!(f, "{name} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidApiToken { .. }
            | ConfigError::InvalidFlag { .. } => None,
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
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "CRON_SECRET",
            "API_TOKENS",
            "SCHEDULER_ENABLED",
        ] {
            env::remove_var(key);
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
        assert!(config.auth.cron_secret.is_none());
        assert!(config.auth.api_tokens.is_empty());
        assert!(config.scheduler.enabled);
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
    fn parses_api_tokens_with_roles() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("API_TOKENS", "abc=ops-1:ops_manager, xyz=epc-7:epc");
        env::set_var("CRON_SECRET", "  tick ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.auth.cron_secret.as_deref(), Some("tick"));
        assert_eq!(
            config.auth.api_tokens,
            vec![
                ApiToken {
                    token: "abc".to_string(),
                    principal_id: "ops-1".to_string(),
                    role: Role::OpsManager,
                },
                ApiToken {
                    token: "xyz".to_string(),
                    principal_id: "epc-7".to_string(),
                    role: Role::Epc,
                },
            ]
        );
    }

    #[test]
    fn rejects_malformed_tokens_and_flags() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("API_TOKENS", "abc=ops-1");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidApiToken { .. })
        ));

        reset_env();
        env::set_var("SCHEDULER_ENABLED", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidFlag { .. })
        ));
    }
}
