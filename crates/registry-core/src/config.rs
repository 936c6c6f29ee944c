//! Configuration module
//!
//! Settings are read once from the environment (plus an optional `.env` file)
//! and handed to the service context; nothing reads the environment afterwards.

use std::env;

use uuid::Uuid;

const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24;
const TOKEN_HASH_COST: u32 = 10;

/// Settings shared by every registry binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub environment: String,
    pub log_format: String,
}

/// Deletion workflow, queue and alert settings
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub base: BaseConfig,
    /// Public URL prefix used in review, read-only and work item links
    pub base_url: String,
    pub nsq_url: String,
    /// 0 leaves the transport default in place
    pub queue_timeout_seconds: u64,
    pub batch_deletion_key: String,
    pub token_hash_cost: u32,
    // Email / alert notifications
    pub email_alerts_enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_tls: bool,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<RegistryConfig>);

impl Config {
    fn as_registry(&self) -> &RegistryConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = RegistryConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_registry().validate()
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment().to_lowercase();
        env == "production" || env == "prod"
    }

    /// Test-only admin operations are allowed here and nowhere else.
    pub fn is_test(&self) -> bool {
        self.environment().eq_ignore_ascii_case("test")
    }

    pub fn server_port(&self) -> u16 {
        self.as_registry().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_registry().base.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.as_registry().base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_registry().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_registry().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.as_registry().base.jwt_secret
    }

    pub fn jwt_expiry_hours(&self) -> i64 {
        self.as_registry().base.jwt_expiry_hours
    }

    pub fn environment(&self) -> &str {
        &self.as_registry().base.environment
    }

    pub fn log_format(&self) -> &str {
        &self.as_registry().base.log_format
    }

    pub fn base_url(&self) -> &str {
        &self.as_registry().base_url
    }

    pub fn nsq_url(&self) -> &str {
        &self.as_registry().nsq_url
    }

    pub fn queue_timeout_seconds(&self) -> Option<u64> {
        match self.as_registry().queue_timeout_seconds {
            0 => None,
            secs => Some(secs),
        }
    }

    pub fn batch_deletion_key(&self) -> &str {
        &self.as_registry().batch_deletion_key
    }

    pub fn token_hash_cost(&self) -> u32 {
        self.as_registry().token_hash_cost
    }

    pub fn email_alerts_enabled(&self) -> bool {
        self.as_registry().email_alerts_enabled
    }

    pub fn smtp_host(&self) -> Option<&str> {
        self.as_registry().smtp_host.as_deref()
    }

    pub fn smtp_port(&self) -> Option<u16> {
        self.as_registry().smtp_port
    }

    pub fn smtp_user(&self) -> Option<&str> {
        self.as_registry().smtp_user.as_deref()
    }

    pub fn smtp_password(&self) -> Option<&str> {
        self.as_registry().smtp_password.as_deref()
    }

    pub fn smtp_from(&self) -> Option<&str> {
        self.as_registry().smtp_from.as_deref()
    }

    pub fn smtp_tls(&self) -> bool {
        self.as_registry().smtp_tls
    }
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            cors_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| JWT_EXPIRY_HOURS.to_string())
                .parse()
                .unwrap_or(JWT_EXPIRY_HOURS),
            environment,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "compact".to_string())
                .to_lowercase(),
        };

        Ok(RegistryConfig {
            base,
            base_url: env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            nsq_url: env::var("NSQ_URL")
                .unwrap_or_else(|_| "http://localhost:4151".to_string())
                .trim_end_matches('/')
                .to_string(),
            queue_timeout_seconds: env::var("QUEUE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            batch_deletion_key: env::var("BATCH_DELETION_KEY")
                .map_err(|_| anyhow::anyhow!("BATCH_DELETION_KEY must be set"))?,
            token_hash_cost: env::var("TOKEN_HASH_COST")
                .unwrap_or_else(|_| TOKEN_HASH_COST.to_string())
                .parse()
                .unwrap_or(TOKEN_HASH_COST),
            email_alerts_enabled: env::var("EMAIL_ALERTS_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|s| s.parse().ok()),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            smtp_from: env::var("SMTP_FROM").ok(),
            smtp_tls: env::var("SMTP_TLS")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.base.database_url.starts_with("postgresql://")
            || self.base.database_url.starts_with("postgres://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if !looks_like_uuid(&self.batch_deletion_key) {
            return Err(anyhow::anyhow!(
                "BATCH_DELETION_KEY must be a UUID-formatted string"
            ));
        }

        if !(4..=31).contains(&self.token_hash_cost) {
            return Err(anyhow::anyhow!(
                "TOKEN_HASH_COST must be between 4 and 31"
            ));
        }

        if self.email_alerts_enabled && (self.smtp_host.is_none() || self.smtp_from.is_none()) {
            return Err(anyhow::anyhow!(
                "EMAIL_ALERTS_ENABLED=true requires SMTP_HOST and SMTP_FROM to be set"
            ));
        }

        Ok(())
    }
}

/// True when the value parses as a hyphenated UUID.
pub fn looks_like_uuid(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}
