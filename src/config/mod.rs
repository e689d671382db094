mod app_config;
mod ses_config;

pub use app_config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, EmailConfig, EncryptionConfig,
    ImageBackendConfig, PaymentConfig, ServerConfig,
};
pub use ses_config::*;
