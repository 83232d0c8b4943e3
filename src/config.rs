use anyhow::{Result, anyhow};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_days: i64,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub client_base_url: String,
    pub default_hourly_rate: i64,
    pub default_callern_rate: i64,
    pub allow_approved_recalculation: bool,
    pub outbox_poll_seconds: u64,
    pub outbox_max_attempts: i32,
    pub cache_ttl_seconds: u64,
    pub sms_provider: String,
    pub sms_sender: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_env_only()
    }

    /// Load configuration from environment variables only (without loading .env files)
    /// This is useful for testing where you want to control the environment directly
    pub fn from_env_only() -> Result<Self> {
        let config = Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://@localhost:5432/teacher_payments".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                "your-super-secret-jwt-key-change-this-in-production-12345".to_string()
            }),
            jwt_expiration_days: parse_var("JWT_EXPIRATION_DAYS", 30)?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            client_base_url: env::var("CLIENT_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            default_hourly_rate: parse_var("DEFAULT_HOURLY_RATE", 500_000)?,
            default_callern_rate: parse_var("DEFAULT_CALLERN_RATE", 400_000)?,
            allow_approved_recalculation: parse_var("ALLOW_APPROVED_RECALCULATION", false)?,
            outbox_poll_seconds: parse_var("OUTBOX_POLL_SECONDS", 30)?,
            outbox_max_attempts: parse_var("OUTBOX_MAX_ATTEMPTS", 5)?,
            cache_ttl_seconds: parse_var("CACHE_TTL_SECONDS", 120)?,
            sms_provider: env::var("SMS_PROVIDER").unwrap_or_else(|_| "log".to_string()),
            sms_sender: env::var("SMS_SENDER").unwrap_or_else(|_| "Academy".to_string()),
        };

        if config.default_hourly_rate < 0 || config.default_callern_rate < 0 {
            return Err(anyhow!("Default rates must not be negative"));
        }
        if config.outbox_max_attempts < 1 {
            return Err(anyhow!("OUTBOX_MAX_ATTEMPTS must be at least 1"));
        }
        if config.outbox_poll_seconds == 0 {
            return Err(anyhow!("OUTBOX_POLL_SECONDS must be at least 1"));
        }

        Ok(config)
    }

    /// Fixed configuration for tests: in-memory storage, no env lookups.
    pub fn test_config() -> Self {
        Config {
            database_url: "memory".to_string(),
            jwt_secret: "test-jwt-secret-key-that-is-long-enough".to_string(),
            jwt_expiration_days: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            client_base_url: "http://localhost:3000".to_string(),
            default_hourly_rate: 500_000,
            default_callern_rate: 400_000,
            allow_approved_recalculation: false,
            outbox_poll_seconds: 30,
            outbox_max_attempts: 3,
            cache_ttl_seconds: 60,
            sms_provider: "log".to_string(),
            sms_sender: "Academy".to_string(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
