use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Key material for the tenant connection-string cipher: either a
    /// base64-encoded 32-byte key or an arbitrary passphrase.
    pub tenant_key: String,
    pub enable_cors: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Defaults per environment, then specific env vars override
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            self.database.acquire_timeout_secs =
                v.parse().unwrap_or(self.database.acquire_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging =
                v.parse().unwrap_or(self.database.enable_query_logging);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("TENANT_KEY") {
            self.security.tenant_key = v;
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig { max_limit: Some(1000), debug_logging: true },
            database: DatabaseConfig {
                max_connections: 10,
                acquire_timeout_secs: 30,
                enable_query_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7,
                tenant_key: String::new(),
                enable_cors: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig { max_limit: Some(500), debug_logging: false },
            database: DatabaseConfig {
                max_connections: 20,
                acquire_timeout_secs: 10,
                enable_query_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                tenant_key: String::new(),
                enable_cors: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig { max_limit: Some(100), debug_logging: false },
            database: DatabaseConfig {
                max_connections: 50,
                acquire_timeout_secs: 5,
                enable_query_logging: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                tenant_key: String::new(),
                enable_cors: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Declared database connections: one entry per physical database the
/// process may talk to, plus the designated main (and optional log)
/// connection ids. Tenant scopes are derived from these at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseOptions {
    pub main: String,
    #[serde(default)]
    pub log: Option<String>,
    pub connections: Vec<ConnectionSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub conn_id: String,
    #[serde(default = "default_db_kind")]
    pub db_kind: String,
    pub url: String,
    /// Map camelCase column names onto snake_case identifiers. Tenant
    /// scopes inherit this flag from the main connection.
    #[serde(default)]
    pub snake_case: bool,
}

fn default_db_kind() -> String {
    "postgres".to_string()
}

impl DatabaseOptions {
    /// Load from the YAML file named by ATRIUM_DB_CONFIG, or fall back to a
    /// single main connection built from DATABASE_URL.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = env::var("ATRIUM_DB_CONFIG") {
            return Self::from_yaml_file(&path);
        }
        let url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("neither ATRIUM_DB_CONFIG nor DATABASE_URL is set"))?;
        Ok(Self {
            main: "main".to_string(),
            log: None,
            connections: vec![ConnectionSettings {
                conn_id: "main".to_string(),
                db_kind: default_db_kind(),
                url,
                snake_case: true,
            }],
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let options: DatabaseOptions = serde_yaml::from_str(&raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connections.is_empty() {
            anyhow::bail!("at least one database connection must be declared");
        }
        if !self.connections.iter().any(|c| c.conn_id == self.main) {
            anyhow::bail!("main connection '{}' is not declared", self.main);
        }
        if let Some(log) = &self.log {
            if !self.connections.iter().any(|c| &c.conn_id == log) {
                anyhow::bail!("log connection '{}' is not declared", log);
            }
        }
        Ok(())
    }

    pub fn main_connection(&self) -> &ConnectionSettings {
        // validate() guarantees the main id is declared
        self.connections
            .iter()
            .find(|c| c.conn_id == self.main)
            .expect("main connection declared")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.filter.max_limit, Some(1000));
        assert!(config.filter.debug_logging);
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn production_defaults() {
        let config = AppConfig::production();
        assert_eq!(config.filter.max_limit, Some(100));
        assert!(!config.filter.debug_logging);
    }

    #[test]
    fn database_options_parse_from_yaml() {
        let yaml = r#"
main: main
log: log
connections:
  - conn_id: main
    url: postgres://app@localhost:5432/atrium
    snake_case: true
  - conn_id: log
    url: postgres://app@localhost:5432/atrium_log
"#;
        let options: DatabaseOptions = serde_yaml::from_str(yaml).unwrap();
        options.validate().unwrap();
        assert_eq!(options.connections.len(), 2);
        assert_eq!(options.main_connection().conn_id, "main");
        assert!(options.main_connection().snake_case);
        assert_eq!(options.connections[1].db_kind, "postgres");
        assert!(!options.connections[1].snake_case);
    }

    #[test]
    fn database_options_reject_undeclared_main() {
        let options = DatabaseOptions {
            main: "primary".to_string(),
            log: None,
            connections: vec![ConnectionSettings {
                conn_id: "main".to_string(),
                db_kind: "postgres".to_string(),
                url: "postgres://localhost/x".to_string(),
                snake_case: false,
            }],
        };
        assert!(options.validate().is_err());
    }
}
