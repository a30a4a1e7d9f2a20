use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
    pub login_attempt_limit: i64,
    pub login_window_seconds: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_garage_creation_fee")]
    pub garage_creation_fee_cents: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub dir: String,
}

fn default_garage_creation_fee() -> i64 {
    5000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { dir: "uploads".to_string() }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("auth.login_attempt_limit", 5)?
            .set_default("auth.login_window_seconds", 900)?
            .set_default("stripe.enabled", false)?
            .set_default("uploads.dir", "uploads")?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with GARAGEHUB__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("GARAGEHUB").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://garagehub.db".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
                login_attempt_limit: 5,
                login_window_seconds: 900,
            },
            stripe: StripeConfig {
                secret_key: None,
                webhook_secret: None,
                enabled: false,
                garage_creation_fee_cents: 5000,
            },
            uploads: UploadConfig {
                dir: "uploads".to_string(),
            },
        }
    }
}
