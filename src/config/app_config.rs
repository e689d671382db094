use crate::error::{AppError, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub payment: PaymentConfig,
    pub images: ImageBackendConfig,
    pub encryption: EncryptionConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// External bank-transfer payment backend.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub api_url: String,
}

/// External image storage backend.
#[derive(Debug, Clone)]
pub struct ImageBackendConfig {
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Base64-encoded 256-bit key protecting stored game credentials.
    pub credential_key: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The single bootstrap identity designated owner, set out-of-band.
    pub owner_email: String,
    /// Static shared secret for machine-to-machine credential reads.
    pub backend_secret_key: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender_address: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .map_err(|_| AppError::ConfigError("Invalid PORT value".to_string()))?,
                max_body_size: env::var("MAX_BODY_SIZE")
                    .unwrap_or_else(|_| "10485760".to_string())
                    .parse()
                    .map_err(|_| AppError::ConfigError("Invalid MAX_BODY_SIZE value".to_string()))?,
            },
            database: DatabaseConfig {
                url: env::var("DB_URL")?,
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::ConfigError("Invalid DB_MAX_CONNECTIONS value".to_string())
                    })?,
            },
            cors: CorsConfig {
                allowed_origins: env::var("FRONTEND_URL")?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            payment: PaymentConfig {
                api_url: env::var("PAYMENT_API_URL")?,
            },
            images: ImageBackendConfig {
                api_url: env::var("IMAGE_API_URL")?,
            },
            encryption: EncryptionConfig {
                credential_key: env::var("CREDENTIAL_KEY")
                    .map_err(|_| AppError::ConfigError("CREDENTIAL_KEY not set".to_string()))?,
            },
            auth: AuthConfig {
                owner_email: env::var("OWNER_EMAIL")
                    .map_err(|_| AppError::ConfigError("OWNER_EMAIL not set".to_string()))?,
                backend_secret_key: env::var("BACKEND_SECRET_KEY")
                    .map_err(|_| AppError::ConfigError("BACKEND_SECRET_KEY not set".to_string()))?,
            },
            email: EmailConfig {
                sender_address: env::var("SENDER_EMAIL")
                    .unwrap_or_else(|_| "noreply@example.com".to_string()),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
