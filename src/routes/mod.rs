mod auth;
mod checkout;
mod health;
mod owner;
mod products;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::{AppState, middleware::require_owner};

pub fn create_router(state: AppState) -> Router<AppState> {
    let owner_routes = Router::new()
        .route("/", get(owner::gate_probe).post(owner::create_product))
        .route(
            "/{code}",
            get(owner::get_product)
                .put(owner::update_product)
                .delete(owner::delete_product),
        )
        .layer(axum_middleware::from_fn_with_state(state, require_owner));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/api/products", get(products::list_products))
        .route("/api/products/available", get(products::list_available))
        .route("/api/products/preorder", get(products::list_preorder))
        .route("/api/products/{code}", get(products::get_product))
        .nest("/api/owner/products", owner_routes)
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/verify-otp", post(auth::verify_otp))
        .route("/api/auth/resend-otp", post(auth::resend_otp))
        .route("/api/auth/check-verification", get(auth::check_verification))
        .route(
            "/api/auth/complete-registration",
            post(auth::complete_registration),
        )
        .route("/api/auth/resend-countdown", get(auth::resend_countdown))
        .route("/api/checkout/confirm", post(checkout::confirm))
        .route(
            "/api/checkout/{order_id}",
            get(checkout::status).delete(checkout::cancel),
        )
}
