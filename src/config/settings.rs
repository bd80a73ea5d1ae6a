//! Process settings from the environment (`.env` supported via dotenvy).

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::Load(format!(
                "invalid APP_ENV: {} (expected development or production)",
                s
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Load(format!(
                "invalid STORE_BACKEND: {} (expected postgres or memory)",
                s
            ))),
        }
    }
}

/// Page size policy for list endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationSettings {
    pub default_limit: u64,
    /// Upper bound applied to client-supplied `limit`.
    pub max_limit: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        PaginationSettings {
            default_limit: 50,
            max_limit: 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. `Shop <noreply@example.com>`.
    pub from: String,
    pub use_tls: bool,
}

#[derive(Clone, Debug)]
pub struct AppSettings {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: String,
    /// PostgreSQL schema holding one table per collection.
    pub schema: String,
    pub max_connections: u32,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub pagination: PaginationSettings,
    pub smtp: Option<SmtpSettings>,
    /// Resource config file; the built-in registry is used when unset.
    pub resources_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            environment: Environment::Production,
            host: "0.0.0.0".into(),
            port: 8000,
            store_backend: StoreBackend::Postgres,
            database_url: "postgres://localhost/catalog".into(),
            schema: "catalog".into(),
            max_connections: 5,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 20 * 1024 * 1024,
            pagination: PaginationSettings::default(),
            smtp: None,
            resources_path: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("invalid {}: {}", name, v))),
    }
}

impl AppSettings {
    /// Load `.env` (if present) and read settings from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = AppSettings::default();
        let environment = match lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            Some(v) => v.parse()?,
            None => d.environment,
        };
        let store_backend = match lookup("STORE_BACKEND") {
            Some(v) => v.parse()?,
            None => d.store_backend,
        };
        let pagination = PaginationSettings {
            default_limit: parse_var("DEFAULT_PAGE_LIMIT", lookup("DEFAULT_PAGE_LIMIT"), d.pagination.default_limit)?,
            max_limit: parse_var("MAX_PAGE_LIMIT", lookup("MAX_PAGE_LIMIT"), d.pagination.max_limit)?,
        };
        if pagination.default_limit == 0 || pagination.max_limit < pagination.default_limit {
            return Err(ConfigError::Validation(
                "page limits must satisfy 0 < DEFAULT_PAGE_LIMIT <= MAX_PAGE_LIMIT".into(),
            ));
        }
        let smtp = match lookup("EMAIL_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_var("EMAIL_PORT", lookup("EMAIL_PORT"), 465)?,
                username: lookup("EMAIL_USER"),
                password: lookup("EMAIL_PASSWORD"),
                from: lookup("EMAIL_FROM").unwrap_or_else(|| "Catalog <noreply@localhost>".into()),
                use_tls: lookup("EMAIL_USE_TLS")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
            }),
            None => None,
        };
        Ok(AppSettings {
            environment,
            host: lookup("HOST").unwrap_or(d.host),
            port: parse_var("PORT", lookup("PORT"), d.port)?,
            store_backend,
            database_url: lookup("DATABASE_URL").unwrap_or(d.database_url),
            schema: lookup("CATALOG_SCHEMA").unwrap_or(d.schema),
            max_connections: parse_var("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), d.max_connections)?,
            upload_dir: lookup("UPLOAD_DIR").map(PathBuf::from).unwrap_or(d.upload_dir),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", lookup("MAX_UPLOAD_BYTES"), d.max_upload_bytes)?,
            pagination,
            smtp,
            resources_path: lookup("RESOURCES_PATH").map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<AppSettings, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppSettings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.environment, Environment::Production);
        assert_eq!(s.port, 8000);
        assert_eq!(s.pagination, PaginationSettings { default_limit: 50, max_limit: 100 });
        assert_eq!(s.store_backend, StoreBackend::Postgres);
        assert!(s.smtp.is_none());
        assert_eq!(s.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn reads_overrides() {
        assert_eq!(settings(&[("NODE_ENV", "development")]).unwrap().environment, Environment::Development);
        let s = settings(&[
            ("APP_ENV", "production"),
            ("PORT", "9100"),
            ("STORE_BACKEND", "memory"),
            ("MAX_PAGE_LIMIT", "250"),
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_PORT", "587"),
            ("EMAIL_USE_TLS", "false"),
        ])
        .unwrap();
        assert_eq!(s.environment, Environment::Production);
        assert_eq!(s.port, 9100);
        assert_eq!(s.store_backend, StoreBackend::Memory);
        assert_eq!(s.pagination.max_limit, 250);
        let smtp = s.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert!(!smtp.use_tls);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(settings(&[("PORT", "eighty")]).is_err());
        assert!(settings(&[("STORE_BACKEND", "mongo")]).is_err());
        assert!(settings(&[("DEFAULT_PAGE_LIMIT", "500"), ("MAX_PAGE_LIMIT", "100")]).is_err());
    }
}
