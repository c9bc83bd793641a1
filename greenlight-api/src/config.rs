/// Configuration management for the API server
///
/// Configuration is read from environment variables, with a `.env` file
/// loaded first when present.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 4000)
/// - `APP_ENV`: `development`, `staging` or `production` (default: development)
/// - `CORS_TRUSTED_ORIGINS`: Space-separated origins, `*` for any (default: none)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 25)
/// - `DATABASE_MIN_CONNECTIONS`: Warm idle connections (default: 0)
/// - `DATABASE_IDLE_TIMEOUT_SECONDS`: Idle connection lifetime (default: 900)
/// - `SHUTDOWN_GRACE_SECONDS`: Time allowed for in-flight requests on shutdown (default: 20)
/// - `MAIL_SENDER`: From address on outgoing mail
/// - `RUN_MIGRATIONS`: Apply pending migrations on startup (default: true)
/// - `RUST_LOG`: Log filter (default: greenlight_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use greenlight_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use greenlight_shared::db::pool::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DbConfig,

    /// Mail configuration
    pub mail: MailConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Deployment environment name, reported by the healthcheck
    pub env: String,

    /// Origins allowed by CORS; `*` allows any
    pub cors_origins: Vec<String>,

    /// Time in-flight requests get to finish after a shutdown signal
    pub shutdown_grace_seconds: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Idle connections kept open
    pub min_connections: u32,

    /// Seconds before an idle connection is closed
    pub idle_timeout_seconds: u64,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

/// Mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// From address on outgoing mail
    pub sender: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or any variable has an
    /// unparseable value.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let cors_origins = env::var("CORS_TRUSTED_ORIGINS")
            .map(|origins| origins.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("API_PORT", 4000)?,
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                cors_origins,
                shutdown_grace_seconds: parse_var("SHUTDOWN_GRACE_SECONDS", 20)?,
            },
            database: DbConfig {
                url: database_url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 25)?,
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS", 0)?,
                idle_timeout_seconds: parse_var("DATABASE_IDLE_TIMEOUT_SECONDS", 900)?,
                run_migrations: parse_var("RUN_MIGRATIONS", true)?,
            },
            mail: MailConfig {
                sender: env::var("MAIL_SENDER")
                    .unwrap_or_else(|_| "Greenlight <no-reply@greenlight.local>".to_string()),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Grace period for in-flight requests during shutdown
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.api.shutdown_grace_seconds)
    }

    /// Pool settings for [`greenlight_shared::db::pool::create_pool`]
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            idle_timeout_seconds: Some(self.database.idle_timeout_seconds),
            ..Default::default()
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 4000,
                env: "development".to_string(),
                cors_origins: vec!["*".to_string()],
                shutdown_grace_seconds: 20,
            },
            database: DbConfig {
                url: "postgres://localhost/greenlight".to_string(),
                max_connections: 25,
                min_connections: 0,
                idle_timeout_seconds: 900,
                run_migrations: false,
            },
            mail: MailConfig {
                sender: "Greenlight <no-reply@greenlight.local>".to_string(),
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(sample().bind_address(), "127.0.0.1:4000");
    }

    #[test]
    fn test_pool_config() {
        let pool = sample().pool_config();

        assert_eq!(pool.url, "postgres://localhost/greenlight");
        assert_eq!(pool.max_connections, 25);
        assert_eq!(pool.idle_timeout_seconds, Some(900));
    }

    #[test]
    fn test_shutdown_grace() {
        assert_eq!(sample().shutdown_grace(), Duration::from_secs(20));
    }

    #[test]
    fn test_parse_var_default() {
        let value: u16 = parse_var("GREENLIGHT_TEST_UNSET_VARIABLE", 4000).unwrap();
        assert_eq!(value, 4000);
    }
}
