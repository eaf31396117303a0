//! Process configuration, built once at startup and passed down explicitly.

use std::fmt;
use std::str::FromStr;
use crate::Error;

pub const DEFAULT_DB_HOST: &str = "your-rds-endpoint.rds.amazonaws.com";
pub const DEFAULT_DB_NAME: &str = "postgres";
pub const DEFAULT_DB_USER: &str = "crawler_user";
pub const DEFAULT_DB_PASSWORD: &str = "your_password";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 5003;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Postgres,
    Sqlite,
    Memory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Postgres => "postgres",
            StorageKind::Sqlite => "sqlite",
            StorageKind::Memory => "memory",
        }
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageKind::Postgres),
            "sqlite" => Ok(StorageKind::Sqlite),
            "memory" => Ok(StorageKind::Memory),
            other => Err(Error::Config(format!(
                "unknown storage backend '{}' (expected postgres, sqlite or memory)",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings for the articles database. For SQLite, `name` is the
/// database file path.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub backend: StorageKind,
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl DatabaseConfig {
    /// True while any credential is still the placeholder shipped as default.
    pub fn uses_default_credentials(&self) -> bool {
        self.backend == StorageKind::Postgres
            && (self.host == DEFAULT_DB_HOST || self.password == DEFAULT_DB_PASSWORD)
    }

    /// Password-free description for log lines.
    pub fn target(&self) -> String {
        match self.backend {
            StorageKind::Postgres => format!(
                "postgres://{}@{}:{}/{}",
                self.user, self.host, self.port, self.name
            ),
            StorageKind::Sqlite => format!("sqlite:{}", self.name),
            StorageKind::Memory => "memory://".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            host: DEFAULT_DB_HOST.to_string(),
            name: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: DEFAULT_DB_PASSWORD.to_string(),
            port: DEFAULT_DB_PORT,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LISTEN_HOST.to_string(),
            port: DEFAULT_LISTEN_PORT,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}
