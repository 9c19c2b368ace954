/// Configuration management for the API server
///
/// Configuration is read from environment variables, after loading a `.env`
/// file if one is present.
///
/// # Environment Variables
///
/// | Variable                       | Default        |
/// |--------------------------------|----------------|
/// | `HOST`                         | `0.0.0.0`      |
/// | `PORT`                         | `8080`         |
/// | `REQUEST_TIMEOUT_SECS`         | `30`           |
/// | `DATABASE_URL`                 | (see below)    |
/// | `DB_HOST`                      | `localhost`    |
/// | `DB_PORT`                      | `5432`         |
/// | `DB_USER`                      | `postgres`     |
/// | `DB_PASSWORD`                  | empty          |
/// | `DB_NAME`                      | `tasktrail`    |
/// | `DB_SSL_MODE`                  | `disable`      |
/// | `DB_MAX_OPEN_CONNS`            | `25`           |
/// | `DB_MAX_IDLE_CONNS`            | `25`           |
/// | `DB_CONN_MAX_LIFETIME_SECS`    | `300`          |
/// | `JWT_SECRET`                   | required       |
/// | `JWT_EXPIRATION_HOURS`         | `24`           |
/// | `JWT_REFRESH_EXPIRATION_DAYS`  | `30`           |
/// | `APP_ENV`                      | `development`  |
/// | `CORS_ORIGINS`                 | `*` outside production |
///
/// `DATABASE_URL` wins over the `DB_*` parts when both are set.
///
/// # Example
///
/// ```no_run
/// use tasktrail_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tasktrail_shared::db::pool::{DatabaseConfig, Dsn, DsnParts};

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    pub app: AppConfig,

    pub build: BuildInfo,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Deadline applied to the storage work of each request
    pub request_timeout: Duration,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub access_ttl: chrono::Duration,

    pub refresh_ttl: chrono::Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"***")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `development`, `staging` or `production`
    pub environment: String,

    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Version metadata baked in at compile time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub build_time: String,
    pub git_commit: String,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
            git_commit: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or too short, or if any
    /// numeric variable fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server = ServerConfig {
            host: var("HOST", "0.0.0.0"),
            port: parse_var(&lookup, "PORT", 8080)?,
            request_timeout: Duration::from_secs(parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30)?),
        };

        let dsn = match lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            Some(url) => Dsn::Url(url),
            None => Dsn::Parts(DsnParts {
                host: var("DB_HOST", "localhost"),
                port: parse_var(&lookup, "DB_PORT", 5432)?,
                user: var("DB_USER", "postgres"),
                password: var("DB_PASSWORD", ""),
                database: var("DB_NAME", "tasktrail"),
                ssl_mode: var("DB_SSL_MODE", "disable"),
            }),
        };

        let database = DatabaseConfig {
            dsn,
            max_open_connections: parse_var(&lookup, "DB_MAX_OPEN_CONNS", 25)?,
            max_idle_connections: parse_var(&lookup, "DB_MAX_IDLE_CONNS", 25)?,
            max_lifetime_seconds: Some(parse_var(&lookup, "DB_CONN_MAX_LIFETIME_SECS", 300)?),
            ..DatabaseConfig::default()
        };

        let secret = lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let jwt = JwtConfig {
            secret,
            access_ttl: chrono::Duration::hours(parse_var(&lookup, "JWT_EXPIRATION_HOURS", 24)?),
            refresh_ttl: chrono::Duration::days(parse_var(
                &lookup,
                "JWT_REFRESH_EXPIRATION_DAYS",
                30,
            )?),
        };

        let environment = var("APP_ENV", "development");
        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(origins) => origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None if environment == "production" => Vec::new(),
            None => vec!["*".to_string()],
        };

        Ok(Self {
            server,
            database,
            jwt,
            app: AppConfig {
                environment,
                cors_origins,
            },
            build: BuildInfo::default(),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
        assert_eq!(config.database.max_open_connections, 25);
        assert_eq!(config.database.max_idle_connections, 25);
        assert_eq!(config.database.max_lifetime_seconds, Some(300));
        assert_eq!(config.jwt.access_ttl, chrono::Duration::hours(24));
        assert_eq!(config.jwt.refresh_ttl, chrono::Duration::days(30));
        assert_eq!(config.app.cors_origins, vec!["*".to_string()]);
        assert!(!config.app.is_production());

        match config.database.dsn {
            Dsn::Parts(parts) => {
                assert_eq!(parts.host, "localhost");
                assert_eq!(parts.port, 5432);
                assert_eq!(parts.database, "tasktrail");
            }
            Dsn::Url(_) => panic!("expected DSN parts"),
        }
    }

    #[test]
    fn test_database_url_wins() {
        let config = config_from(&[
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgres://u:p@db:5432/app"),
            ("DB_HOST", "ignored"),
        ])
        .unwrap();

        assert_eq!(
            config.database.dsn,
            Dsn::Url("postgres://u:p@db:5432/app".to_string())
        );
    }

    #[test]
    fn test_missing_or_short_secret() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("JWT_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("JWT_SECRET", SECRET), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_production_cors() {
        let config = config_from(&[("JWT_SECRET", SECRET), ("APP_ENV", "production")]).unwrap();
        assert!(config.app.is_production());
        assert!(config.app.cors_origins.is_empty());

        let config = config_from(&[
            ("JWT_SECRET", SECRET),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ])
        .unwrap();
        assert_eq!(
            config.app.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_secret_masked_in_debug() {
        let config = config_from(&[("JWT_SECRET", SECRET)]).unwrap();
        assert!(!format!("{:?}", config.jwt).contains(SECRET));
    }
}
