//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection configuration.
    pub database: DatabaseConfig,

    /// Conversion behavior configuration.
    #[serde(default)]
    pub convert: ConvertConfig,
}

/// PostgreSQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized back out.
    #[serde(skip_serializing)]
    pub password: String,

    /// SSL mode passed through to the connection string (default: "prefer").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

// Manual Debug so passwords never leak into logs or error chains.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Conversion behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Drop every remaining sequence generator after conversion (default: true).
    #[serde(default = "default_true")]
    pub drop_sequences: bool,

    /// Extension providing the random-UUID generator function
    /// (default: "uuid-ossp", which supplies `uuid_generate_v4()`).
    #[serde(default = "default_uuid_extension")]
    pub uuid_extension: String,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            drop_sequences: default_true(),
            uuid_extension: default_uuid_extension(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "prefer".to_string()
}

fn default_true() -> bool {
    true
}

fn default_uuid_extension() -> String {
    "uuid-ossp".to_string()
}
