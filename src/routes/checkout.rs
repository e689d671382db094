use aws_sdk_sesv2::Client as SesClient;
use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::prelude::ToPrimitive;
use sqlx::PgPool;
use sqlx::types::Json as SqlJson;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{
        ApiResponse, CheckoutConfirmRequest, CheckoutConfirmResponse, CheckoutStatusResponse,
        ProductStatus,
    },
    queries::product_queries,
    services::{checkout::CompletionAction, crypto::CredentialCipher, email},
};

/// Confirms an order intent: validates the product, mints a transaction on
/// the payment backend and starts status polling. On failure nothing is
/// persisted and the caller stays at the form step.
pub async fn confirm(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutConfirmRequest>,
) -> Result<Json<ApiResponse<CheckoutConfirmResponse>>> {
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(AppError::Validation(
            "Vui lòng nhập email hợp lệ".to_string(),
        ));
    }

    if payload.order_id.trim().is_empty() {
        return Err(AppError::Validation("Mã đơn hàng là bắt buộc".to_string()));
    }

    let record = product_queries::find_by_code(&state.db, &payload.product_code)
        .await?
        .ok_or_else(|| AppError::NotFound("Không tìm thấy sản phẩm".to_string()))?;

    if record.product.status != ProductStatus::InStock {
        return Err(AppError::Validation(
            "Sản phẩm hiện không khả dụng".to_string(),
        ));
    }

    let amount = record
        .product
        .price
        .trunc()
        .to_i64()
        .ok_or_else(|| AppError::InternalError("Không thể tính số tiền đơn hàng".to_string()))?;

    let pool = state.db.clone();
    let cipher = state.cipher.clone();
    let ses_client = state.ses_client.clone();
    let sender_email = state.sender_email.clone();
    let product_code = payload.product_code.clone();
    let buyer_email = payload.email.clone();

    let on_complete: CompletionAction = Box::new(move || {
        Box::pin(deliver_credentials(
            pool,
            cipher,
            ses_client,
            sender_email,
            product_code,
            buyer_email,
        ))
    });

    let response = state
        .checkout
        .confirm(
            &payload.order_id,
            &payload.product_code,
            &payload.email,
            amount,
            &state.payment,
            on_complete,
        )
        .await?;

    Ok(Json(ApiResponse::ok(response)))
}

pub async fn status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<CheckoutStatusResponse>>> {
    let status = state
        .checkout
        .status(&order_id)
        .ok_or_else(|| AppError::NotFound("Không tìm thấy đơn hàng".to_string()))?;

    Ok(Json(ApiResponse::ok(status)))
}

/// Teardown for navigation away; releases the poll handle.
pub async fn cancel(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    if !state.checkout.cancel(&order_id) {
        return Err(AppError::NotFound("Không tìm thấy đơn hàng".to_string()));
    }

    tracing::info!("Checkout session {} cancelled", order_id);

    Ok(Json(ApiResponse::message("Đã hủy phiên thanh toán")))
}

/// Runs once after a completed payment: decrypts the stored game account
/// and delivers it to the buyer out-of-band. Failures are logged — the
/// purchase already succeeded, so nothing is surfaced to the poll loop.
async fn deliver_credentials(
    pool: PgPool,
    cipher: CredentialCipher,
    ses_client: SesClient,
    sender_email: String,
    product_code: String,
    buyer_email: String,
) {
    let record = match product_queries::find_by_code(&pool, &product_code).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::error!("Paid product {} no longer exists", product_code);
            return;
        }
        Err(e) => {
            tracing::error!("Failed to load product {} for delivery: {}", product_code, e);
            return;
        }
    };

    let Some(SqlJson(account)) = record.game_account else {
        tracing::warn!("Product {} has no stored credentials to deliver", product_code);
        return;
    };

    let decrypted = cipher
        .decrypt(&account.username, &account.encryption_key_id)
        .and_then(|username| {
            cipher
                .decrypt(&account.password, &account.encryption_key_id)
                .map(|password| (username, password))
        });

    let (username, password) = match decrypted {
        Ok(pair) => pair,
        Err(_) => {
            tracing::error!(
                "Credential decryption failed for paid product {}",
                product_code
            );
            return;
        }
    };

    if let Err(e) = email::send_credentials_email(
        &ses_client,
        &buyer_email,
        &record.product.name,
        &username,
        &password,
        &sender_email,
    )
    .await
    {
        tracing::error!("Failed to deliver credentials to {}: {}", buyer_email, e);
    } else {
        tracing::info!("Credentials for {} delivered to {}", product_code, buyer_email);
    }
}
