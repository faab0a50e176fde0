use config::{Config, ConfigBuilder, ConfigError, File, builder::DefaultState};
use serde::Deserialize;

/// PostgreSQL connection configuration.
///
/// Two modes are supported:
/// - Development (`IS_DEV`): discrete host/port/user/password/database
/// - Hosted: a single connection string, TLS with certificate checks relaxed
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    #[serde(default)]
    pub is_dev: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Connection string used outside development mode
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

fn default_pool_size() -> usize {
    16
}

fn default_connect_retries() -> u32 {
    3
}

fn default_port() -> u16 {
    5432
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            is_dev: false,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            url: None,
            pool_size: default_pool_size(),
            connect_retries: default_connect_retries(),
        }
    }
}

/// Resolved connection parameters for the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget<'a> {
    Discrete {
        host: &'a str,
        port: u16,
        user: &'a str,
        password: Option<&'a str>,
        database: &'a str,
    },
    /// Connection string; TLS is used without verifying the server certificate.
    Url(&'a str),
}

impl PostgresSettings {
    pub fn target(&self) -> Result<ConnectionTarget<'_>, ConfigError> {
        fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, ConfigError> {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::NotFound(format!("postgres.{}", key)))
        }

        if self.is_dev {
            Ok(ConnectionTarget::Discrete {
                host: required(&self.host, "host")?,
                port: self.port.unwrap_or_else(default_port),
                user: required(&self.user, "user")?,
                password: self.password.as_deref(),
                database: required(&self.database, "database")?,
            })
        } else {
            Ok(ConnectionTarget::Url(required(&self.url, "url")?))
        }
    }
}

/// Root application configuration.
///
/// Loaded from an optional `config` file, then overridden by the
/// environment variables the hosted deployments already set.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub postgres: PostgresSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Some("config"), |key| std::env::var(key).ok())
    }

    /// Builds settings from an optional config file and an environment lookup.
    pub fn load<F>(file: Option<&str>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder();
        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).required(false));
        }

        let builder = apply_env_overrides(builder, &lookup)?;
        let settings: Settings = builder.build()?.try_deserialize()?;

        Ok(settings)
    }
}

fn apply_env_overrides<F>(
    builder: ConfigBuilder<DefaultState>,
    lookup: &F,
) -> Result<ConfigBuilder<DefaultState>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = match lookup("DB_PORT").filter(|p| !p.is_empty()) {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|e| ConfigError::Message(format!("invalid DB_PORT {:?}: {}", raw, e)))?,
        ),
        None => None,
    };

    // Any non-empty IS_DEV counts as development mode
    let is_dev = lookup("IS_DEV").map(|v| !v.is_empty());
    let url = lookup("DATABASE_URL_V2")
        .filter(|u| !u.is_empty())
        .or_else(|| lookup("DATABASE_URL"));

    builder
        .set_override_option("postgres.is_dev", is_dev)?
        .set_override_option("postgres.host", lookup("DB_HOST"))?
        .set_override_option("postgres.port", port)?
        .set_override_option("postgres.user", lookup("DB_USER"))?
        .set_override_option("postgres.password", lookup("DB_PASSWORD"))?
        .set_override_option("postgres.database", lookup("DB_NAME"))?
        .set_override_option("postgres.url", url)?
        .set_override_option("log_level", lookup("LOG_LEVEL"))
}
