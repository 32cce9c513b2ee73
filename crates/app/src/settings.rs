//! Handles settings for the application. Configuration is read from
//! `settings.toml` (optional) and `HOUSEHOLD__*` environment variables,
//! e.g. `HOUSEHOLD__SERVER__PORT=8080`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Plaid {
    pub client_id: String,
    pub secret: String,
    /// `sandbox`, `development` or `production`.
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sync {
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_pages: usize,
}

impl Default for Sync {
    fn default() -> Self {
        Self {
            concurrency: 10,
            queue_capacity: 256,
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_pages: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    /// In-memory when absent.
    pub database: Option<Database>,
    pub server: Option<Server>,
    pub plaid: Option<Plaid>,
    /// Key sealing linked-source credentials: base64 of 32 bytes, or 32
    /// ASCII characters.
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub sync: Sync,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("HOUSEHOLD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .set_default("app.level", "info")
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn minimal_settings_use_defaults() {
        let settings = parse(r#"database = "memory""#);
        assert_eq!(settings.app.level, "info");
        assert!(matches!(settings.database, Some(Database::Memory)));
        assert!(settings.server.is_none());
        assert_eq!(settings.sync.concurrency, 10);
        assert_eq!(settings.sync.max_pages, 50);
    }

    #[test]
    fn full_settings_are_read() {
        let settings = parse(
            r#"
            encryption_key = "0123456789abcdef0123456789abcdef"

            [app]
            level = "debug"

            [database]
            sqlite = "./household.db"

            [server]
            port = 3000
            request_timeout_ms = 2500

            [plaid]
            client_id = "id"
            secret = "secret"
            environment = "production"

            [sync]
            concurrency = 4
            "#,
        );
        assert_eq!(settings.app.level, "debug");
        assert!(matches!(
            settings.database,
            Some(Database::Sqlite(ref path)) if path == "./household.db"
        ));
        let server = settings.server.unwrap();
        assert_eq!(server.port, 3000);
        assert_eq!(server.request_timeout_ms, 2500);
        assert_eq!(settings.plaid.unwrap().environment.as_deref(), Some("production"));
        assert_eq!(settings.sync.concurrency, 4);
        assert_eq!(settings.sync.queue_capacity, 256);
    }
}
