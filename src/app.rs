use std::sync::Arc;

use aws_sdk_sesv2::Client as SesClient;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::{
    config::{AppConfig, AuthConfig},
    database,
    error::Result,
    routes,
    services::{
        checkout::CheckoutSessions, crypto::CredentialCipher, images::ImageClient, otp::OtpStore,
        payment::PaymentClient,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub ses_client: SesClient,
    pub cipher: CredentialCipher,
    pub otp_store: Arc<OtpStore>,
    pub checkout: CheckoutSessions,
    pub payment: PaymentClient,
    pub images: ImageClient,
    pub auth: AuthConfig,
    pub sender_email: String,
}

pub async fn build(config: &AppConfig) -> Result<Router> {
    let pool = database::create_pool(&config.database).await?;
    let ses_client = crate::config::load_ses_client().await?;
    let cipher = CredentialCipher::from_config(&config.encryption)?;

    let state = AppState {
        db: pool,
        ses_client,
        cipher,
        otp_store: Arc::new(OtpStore::new()),
        checkout: CheckoutSessions::default(),
        payment: PaymentClient::new(config.payment.api_url.clone()),
        images: ImageClient::new(config.images.api_url.clone()),
        auth: config.auth.clone(),
        sender_email: config.email.sender_address.clone(),
    };

    let allowed_origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|_| {
                crate::error::AppError::ConfigError(format!("Invalid CORS origin: {}", origin))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            http::header::CONTENT_TYPE,
            http::header::AUTHORIZATION,
            http::HeaderName::from_static(crate::middleware::OWNER_UID_HEADER),
        ])
        .allow_origin(allowed_origins);

    let app = routes::create_router(state.clone())
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(cors)
        .with_state(state);

    Ok(app)
}
