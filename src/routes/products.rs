use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{ApiResponse, Product, ProductType, ProductWithCredentials, to_public_view},
    queries::product_queries,
};

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    let products: Vec<Product> = product_queries::find_all(&state.db)
        .await?
        .into_iter()
        .map(to_public_view)
        .collect();

    let count = products.len();
    Ok(Json(ApiResponse::ok_with_count(products, count)))
}

pub async fn list_available(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    list_by_type(&state, ProductType::Available).await
}

pub async fn list_preorder(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    list_by_type(&state, ProductType::Preorder).await
}

async fn list_by_type(
    state: &AppState,
    product_type: ProductType,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    let products: Vec<Product> = product_queries::find_by_type(&state.db, product_type)
        .await?
        .into_iter()
        .map(to_public_view)
        .collect();

    let count = products.len();
    Ok(Json(ApiResponse::ok_with_count(products, count)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetailQuery {
    #[serde(default)]
    pub include_credentials: bool,
    pub backend_key: Option<String>,
}

/// Single product lookup. With `includeCredentials=true` and the static
/// backend secret, returns the credentialed record (ciphertext) for
/// machine-to-machine use; everyone else gets the public view.
pub async fn get_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<ProductDetailQuery>,
) -> Result<Json<serde_json::Value>> {
    if code.trim().is_empty() {
        return Err(AppError::Validation("Mã sản phẩm là bắt buộc".to_string()));
    }

    let record: ProductWithCredentials = product_queries::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| AppError::NotFound("Không tìm thấy sản phẩm".to_string()))?;

    if params.include_credentials {
        if params.backend_key.as_deref() != Some(state.auth.backend_secret_key.as_str()) {
            return Err(AppError::Unauthorized(
                "Không có quyền truy cập thông tin tài khoản".to_string(),
            ));
        }

        let body = serde_json::to_value(ApiResponse::ok(record))
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        return Ok(Json(body));
    }

    let body = serde_json::to_value(ApiResponse::ok(to_public_view(record)))
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    Ok(Json(body))
}
