//! Dialects and connection parameters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString, IntoStaticStr};

/// SQL engine family a connector speaks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Dialect {
    #[strum(to_string = "postgresql", serialize = "postgres")]
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgresql,
    Mysql,
}

impl Dialect {
    /// Engine tag used for prompt selection (`postgresql`, `mysql`)
    pub fn tag(&self) -> &'static str {
        self.into()
    }

    /// Resolve an engine tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        tag.parse().ok()
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Postgresql => 5432,
            Dialect::Mysql => 3306,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Dialect::Postgresql => "PostgreSQL",
            Dialect::Mysql => "MySQL",
        }
    }

    /// sqlparser dialect used to read statements for this engine
    pub fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        match self {
            Dialect::Postgresql => Box::new(sqlparser::dialect::PostgreSqlDialect {}),
            Dialect::Mysql => Box::new(sqlparser::dialect::MySqlDialect {}),
        }
    }
}

/// Already-decrypted parameters for opening a connector
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Require TLS; otherwise TLS is attempted and plaintext is accepted
    #[serde(default)]
    pub ssl: bool,
    /// Additional driver parameters (e.g. `connect_timeout_secs`)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Create a configuration with the dialect's default port
    pub fn new(dialect: Dialect, host: &str) -> Self {
        Self {
            dialect,
            host: host.to_string(),
            port: dialect.default_port(),
            database: None,
            username: None,
            password: None,
            ssl: false,
            params: HashMap::new(),
        }
    }

    /// Create a PostgreSQL configuration
    pub fn new_postgres(host: &str, port: u16, database: &str, username: &str) -> Self {
        let mut config = Self::new(Dialect::Postgresql, host);
        config.port = port;
        config.database = Some(database.to_string());
        config.username = Some(username.to_string());
        config
    }

    /// Create a MySQL configuration
    pub fn new_mysql(host: &str, port: u16, database: &str, username: &str) -> Self {
        let mut config = Self::new(Dialect::Mysql, host);
        config.port = port;
        config.database = Some(database.to_string());
        config.username = Some(username.to_string());
        config
    }

    /// Get a numeric parameter, ignoring values that do not parse
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.parse().ok())
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("ssl", &self.ssl)
            .field("params", &self.params)
            .finish()
    }
}
