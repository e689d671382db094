use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use sqlx::types::Json as SqlJson;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{
        ApiResponse, GameAccount, OwnerContext, Product, ProductRequest, ProductWithCredentials,
    },
    queries::product_queries,
    services::crypto::{CredentialCipher, secure_placeholder},
};

/// Gate probe used by the dashboard: reaching this handler at all means the
/// role gate accepted the caller.
pub async fn gate_probe(Extension(_ctx): Extension<OwnerContext>) -> Json<ApiResponse<()>> {
    Json(ApiResponse::success())
}

fn encrypt_account(
    cipher: &CredentialCipher,
    payload: &ProductRequest,
) -> Result<Option<GameAccount>> {
    let Some(input) = &payload.game_account else {
        return Ok(None);
    };

    // blank credential fields on update leave stored ciphertext untouched
    if input.username.trim().is_empty() && input.password.trim().is_empty() {
        return Ok(None);
    }

    let (username, key_id) = cipher.encrypt(&input.username)?;
    let (password, _) = cipher.encrypt(&input.password)?;

    Ok(Some(GameAccount {
        username,
        password,
        encryption_key_id: key_id,
    }))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<OwnerContext>,
    Json(payload): Json<ProductRequest>,
) -> Result<Json<ApiResponse<ProductWithCredentials>>> {
    let price = payload.validate()?;

    // duplicate-code check before any backend write
    if product_queries::code_exists(&state.db, &payload.product_code).await? {
        return Err(AppError::Conflict(format!(
            "Sản phẩm với mã {} đã tồn tại",
            payload.product_code
        )));
    }

    let game_account = encrypt_account(&state.cipher, &payload)?;

    let record =
        product_queries::insert(&state.db, &payload, price, game_account, &ctx.uid).await?;

    tracing::info!("Product {} created by {}", record.product.product_code, ctx.uid);

    Ok(Json(ApiResponse::ok(record)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<OwnerContext>,
    Path(code): Path<String>,
    Json(payload): Json<ProductRequest>,
) -> Result<Json<ApiResponse<ProductWithCredentials>>> {
    let price = payload.validate()?;

    let game_account = encrypt_account(&state.cipher, &payload)?;

    let record = product_queries::update(&state.db, &code, &payload, price, game_account)
        .await?
        .ok_or_else(|| AppError::NotFound("Không tìm thấy sản phẩm".to_string()))?;

    tracing::info!("Product {} updated by {}", code, ctx.uid);

    Ok(Json(ApiResponse::ok(record)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedAccount {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProductView {
    #[serde(flatten)]
    pub product: Product,
    pub game_account: Option<DecryptedAccount>,
}

/// Owner read with credentials decrypted. A decryption failure comes back
/// masked with a support-contact message rather than a raw error.
pub async fn get_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<OwnerProductView>>> {
    let record = product_queries::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| AppError::NotFound("Không tìm thấy sản phẩm".to_string()))?;

    let mut support_message = None;

    let game_account = match record.game_account {
        None => None,
        Some(SqlJson(account)) => {
            let decrypted = state
                .cipher
                .decrypt(&account.username, &account.encryption_key_id)
                .and_then(|username| {
                    state
                        .cipher
                        .decrypt(&account.password, &account.encryption_key_id)
                        .map(|password| (username, password))
                });

            match decrypted {
                Ok((username, password)) => Some(DecryptedAccount { username, password }),
                Err(_) => {
                    tracing::error!("Credential decryption failed for product {}", code);
                    support_message = Some(
                        "Không thể giải mã thông tin tài khoản, vui lòng liên hệ hỗ trợ"
                            .to_string(),
                    );
                    Some(DecryptedAccount {
                        username: secure_placeholder(8),
                        password: secure_placeholder(8),
                    })
                }
            }
        }
    };

    let view = OwnerProductView {
        product: record.product,
        game_account,
    };

    let response = match support_message {
        Some(message) => ApiResponse::ok_with_message(view, message),
        None => ApiResponse::ok(view),
    };

    Ok(Json(response))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<OwnerContext>,
    Path(code): Path<String>,
) -> Result<StatusCode> {
    let record = product_queries::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| AppError::NotFound("Không tìm thấy sản phẩm".to_string()))?;

    product_queries::delete(&state.db, &code).await?;

    // best-effort cleanup on the external image backend
    let filenames = cleanup_filenames(
        &record.product.images,
        record.product.thumbnail_image.as_deref(),
    );
    state.images.delete_images(&filenames).await;

    tracing::info!("Product {} deleted by {}", code, ctx.uid);

    Ok(StatusCode::NO_CONTENT)
}

/// Filenames to purge from the image backend when a product goes away. The
/// thumbnail usually repeats one of the gallery images, so the list is
/// deduplicated to avoid issuing the same delete twice.
fn cleanup_filenames(images: &[String], thumbnail: Option<&str>) -> Vec<String> {
    let mut filenames: Vec<String> = images
        .iter()
        .filter_map(|url| url.rsplit('/').next())
        .map(str::to_string)
        .collect();
    if let Some(name) = thumbnail.and_then(|t| t.rsplit('/').next()) {
        filenames.push(name.to_string());
    }
    filenames.sort();
    filenames.dedup();
    filenames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_list_drops_thumbnail_repeating_a_gallery_image() {
        let images = vec![
            "https://img.example.com/uploads/a.jpg".to_string(),
            "https://img.example.com/uploads/b.jpg".to_string(),
        ];

        // thumbnail repeats the first gallery image, non-adjacently
        let filenames =
            cleanup_filenames(&images, Some("https://img.example.com/uploads/a.jpg"));
        assert_eq!(filenames, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn cleanup_list_keeps_a_distinct_thumbnail() {
        let images = vec!["https://img.example.com/uploads/a.jpg".to_string()];

        let filenames =
            cleanup_filenames(&images, Some("https://img.example.com/uploads/thumb.jpg"));
        assert_eq!(filenames, vec!["a.jpg", "thumb.jpg"]);

        assert_eq!(cleanup_filenames(&images, None), vec!["a.jpg"]);
    }
}
