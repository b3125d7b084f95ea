use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use restify_application::RestifyConfig;
use restify_core::AppError;
use tracing_subscriber::EnvFilter;

/// What the binary does after loading configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCommand {
    /// Serve HTTP requests.
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Apply migrations, seed demo data and exit.
    Seed,
}

/// Storage backend serving repository tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreDriver {
    /// Process memory, seeded with demo data.
    Memory,
    /// PostgreSQL at the configured url.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub command: ApiCommand,
    pub api_host: String,
    pub api_port: u16,
    pub route_prefix: String,
    pub store_driver: StoreDriver,
    pub redis_url: Option<String>,
    pub frontend_url: String,
    pub cookie_secure: bool,
    pub bootstrap_token: Option<String>,
    pub restify: RestifyConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let command = match env::args().nth(1).as_deref() {
            None | Some("serve") => ApiCommand::Serve,
            Some("migrate") => ApiCommand::Migrate,
            Some("seed") => ApiCommand::Seed,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "unknown command '{other}', expected serve, migrate or seed"
                )));
            }
        };

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let route_prefix = normalize_prefix(
            env::var("RESTIFY_PREFIX")
                .unwrap_or_else(|_| "/api/restify".to_owned())
                .as_str(),
        );

        let store_driver = match env::var("STORE_DRIVER")
            .unwrap_or_else(|_| "memory".to_owned())
            .as_str()
        {
            "memory" => StoreDriver::Memory,
            "postgres" => StoreDriver::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10_u32)?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "STORE_DRIVER must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };
        if command != ApiCommand::Serve && store_driver == StoreDriver::Memory {
            return Err(AppError::Validation(
                "migrate and seed require STORE_DRIVER=postgres".to_owned(),
            ));
        }

        let redis_url = optional_env("REDIS_URL");
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let cookie_secure = env_flag("SESSION_COOKIE_SECURE", false)?;

        let bootstrap_token = optional_env("AUTH_BOOTSTRAP_TOKEN");
        if bootstrap_token
            .as_deref()
            .is_some_and(|token| token.len() < 16)
        {
            return Err(AppError::Validation(
                "AUTH_BOOTSTRAP_TOKEN must be at least 16 characters".to_owned(),
            ));
        }

        let policy_cache_ttl_seconds = if env_flag("POLICY_CACHE_ENABLED", false)? {
            Some(parse_env("POLICY_CACHE_TTL_SECONDS", 60_u32)?)
        } else {
            None
        };

        let defaults = RestifyConfig::default();
        let action_chunk_size = parse_env("ACTION_CHUNK_SIZE", defaults.action_chunk_size)?;
        if action_chunk_size == 0 {
            return Err(AppError::Validation(
                "ACTION_CHUNK_SIZE must be greater than zero".to_owned(),
            ));
        }

        let restify = RestifyConfig {
            search_case_sensitive: env_flag("SEARCH_CASE_SENSITIVE", false)?,
            log_repository_mutations: env_flag("ACTION_LOG_REPOSITORIES", true)?,
            log_actions: env_flag("ACTION_LOG_ACTIONS", true)?,
            action_chunk_size,
            policy_cache_ttl_seconds,
            ..defaults
        };

        Ok(Self {
            command,
            api_host,
            api_port,
            route_prefix,
            store_driver,
            redis_url,
            frontend_url,
            cookie_secure,
            bootstrap_token,
            restify,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Ensures a leading slash and no trailing slash; `/` and empty become no prefix.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_flag(name: &str, default: bool) -> Result<bool, AppError> {
    match optional_env(name) {
        None => Ok(default),
        Some(value) => restify_domain::parse_bool(&value).ok_or_else(|| {
            AppError::Validation(format!("{name} must be a boolean, got '{value}'"))
        }),
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::normalize_prefix;

    #[test]
    fn prefixes_are_normalized() {
        assert_eq!(normalize_prefix("api/restify/"), "/api/restify");
        assert_eq!(normalize_prefix("/api"), "/api");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }
}
