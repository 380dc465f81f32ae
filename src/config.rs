//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub processor: ProcessorConfig,
    pub checkout: CheckoutConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Payment processor (Mercado Pago) configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub base_url: String,
    pub access_token: String,
    /// Shared secret for webhook signature verification. When absent the
    /// webhook accepts unsigned calls; logged loudly at startup.
    pub webhook_secret: Option<String>,
    pub webhook_url: Option<String>,
    pub request_timeout: u64, // seconds
    pub max_retries: u32,
}

/// Checkout business configuration
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Processor percentage fee in basis points (399 = 3.99%).
    pub surcharge_rate_bps: i64,
    /// Processor fixed fee per transaction, minor units.
    pub surcharge_fixed_fee: i64,
    /// Public site URL used for hosted-checkout back links.
    pub site_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            processor: ProcessorConfig::from_env()?,
            checkout: CheckoutConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.processor.validate()?;
        self.checkout.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ProcessorConfig {
            base_url: env::var("MP_BASE_URL")
                .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
            access_token: env::var("MP_ACCESS_TOKEN")
                .map_err(|_| ConfigError::MissingVariable("MP_ACCESS_TOKEN".to_string()))?,
            webhook_secret: env::var("MP_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            webhook_url: env::var("MP_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
            request_timeout: env::var("MP_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MP_REQUEST_TIMEOUT".to_string()))?,
            max_retries: env::var("MP_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MP_MAX_RETRIES".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token.is_empty() {
            return Err(ConfigError::InvalidValue("MP_ACCESS_TOKEN".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "MP_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue("MP_REQUEST_TIMEOUT".to_string()));
        }

        Ok(())
    }
}

impl CheckoutConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CheckoutConfig {
            surcharge_rate_bps: env::var("SURCHARGE_RATE_BPS")
                .unwrap_or_else(|_| "399".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SURCHARGE_RATE_BPS".to_string()))?,
            surcharge_fixed_fee: env::var("SURCHARGE_FIXED_FEE")
                .unwrap_or_else(|_| "39".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SURCHARGE_FIXED_FEE".to_string()))?,
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..10_000).contains(&self.surcharge_rate_bps) {
            return Err(ConfigError::InvalidValue(
                "SURCHARGE_RATE_BPS must be in [0, 10000)".to_string(),
            ));
        }

        if self.surcharge_fixed_fee < 0 {
            return Err(ConfigError::InvalidValue(
                "SURCHARGE_FIXED_FEE cannot be negative".to_string(),
            ));
        }

        if self.site_url.is_empty() {
            return Err(ConfigError::InvalidValue("SITE_URL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
