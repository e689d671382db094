use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub const MAX_PRODUCT_IMAGES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Available,
    Preorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    InStock,
    OutOfStock,
    Discontinued,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "game_server")]
pub enum GameServer {
    NA,
    JP,
    TW,
    KR,
    EN,
    Global,
}

/// One ordered specification line shown on the product page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Specification {
    pub label: String,
    pub value: String,
}

/// Public product view. This is the only product shape that may leave the
/// trust boundary for non-owner callers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub product_code: String,
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub images: Vec<String>,
    pub thumbnail_image: Option<String>,
    pub specifications: Json<Vec<Specification>>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub status: ProductStatus,
    pub server: GameServer,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

/// Encrypted game account stored alongside a product. `username` and
/// `password` hold ciphertext, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameAccount {
    pub username: String,
    pub password: String,
    pub encryption_key_id: String,
}

/// Owner-only product view. Must never be serialized to a non-owner caller;
/// strip through [`to_public_view`] at the data-access boundary.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithCredentials {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub product: Product,
    pub game_account: Option<Json<GameAccount>>,
}

/// Drops the credential field from an owner record. Total and idempotent:
/// works for any input, including records without a game account.
pub fn to_public_view(record: ProductWithCredentials) -> Product {
    record.product
}

/// Plaintext credentials supplied by the owner dashboard on create/update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAccountInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub product_code: String,
    pub name: String,
    /// Decimal string, VND.
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub thumbnail_image: Option<String>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub status: ProductStatus,
    pub server: GameServer,
    pub game_account: Option<GameAccountInput>,
}

impl ProductRequest {
    /// Form-level validation, run before any backend write.
    pub fn validate(&self) -> Result<Decimal> {
        if self.product_code.trim().is_empty() {
            return Err(AppError::Validation("Mã sản phẩm là bắt buộc".to_string()));
        }

        if self.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Tên sản phẩm là bắt buộc".to_string(),
            ));
        }

        let price: Decimal = self
            .price
            .trim()
            .parse()
            .map_err(|_| AppError::Validation("Giá sản phẩm không hợp lệ".to_string()))?;

        if price <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Giá sản phẩm phải lớn hơn 0".to_string(),
            ));
        }

        if self.images.len() > MAX_PRODUCT_IMAGES {
            return Err(AppError::Validation(format!(
                "Tối đa {} ảnh cho mỗi sản phẩm",
                MAX_PRODUCT_IMAGES
            )));
        }

        // Exactly one thumbnail is required before a product is published.
        if self.status != ProductStatus::Discontinued
            && self
                .thumbnail_image
                .as_deref()
                .is_none_or(|t| t.trim().is_empty())
        {
            return Err(AppError::Validation(
                "Ảnh đại diện là bắt buộc trước khi đăng bán".to_string(),
            ));
        }

        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> Product {
        Product {
            id: Uuid::new_v4(),
            product_code: "PJSK-001".to_string(),
            name: "Starter account".to_string(),
            price: Decimal::from(500_000),
            description: "4* guaranteed".to_string(),
            images: vec!["a.jpg".to_string()],
            thumbnail_image: Some("a.jpg".to_string()),
            specifications: Json(vec![Specification {
                label: "Rank".to_string(),
                value: "120".to_string(),
            }]),
            product_type: ProductType::Available,
            status: ProductStatus::InStock,
            server: GameServer::JP,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: "owner-uid".to_string(),
        }
    }

    fn sample_request() -> ProductRequest {
        ProductRequest {
            product_code: "PJSK-001".to_string(),
            name: "Starter account".to_string(),
            price: "500000".to_string(),
            description: String::new(),
            images: vec!["a.jpg".to_string()],
            thumbnail_image: Some("a.jpg".to_string()),
            specifications: Vec::new(),
            product_type: ProductType::Available,
            status: ProductStatus::InStock,
            server: GameServer::JP,
            game_account: None,
        }
    }

    #[test]
    fn public_view_never_contains_game_account() {
        let record = ProductWithCredentials {
            product: sample_product(),
            game_account: Some(Json(GameAccount {
                username: "b64ciphertext".to_string(),
                password: "b64ciphertext".to_string(),
                encryption_key_id: "v1".to_string(),
            })),
        };

        let public = to_public_view(record);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("gameAccount").is_none());
        assert_eq!(json["productCode"], "PJSK-001");
    }

    #[test]
    fn public_view_total_for_missing_credentials() {
        let record = ProductWithCredentials {
            product: sample_product(),
            game_account: None,
        };

        let public = to_public_view(record);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("gameAccount").is_none());
    }

    #[test]
    fn credentialed_view_serializes_flattened() {
        let record = ProductWithCredentials {
            product: sample_product(),
            game_account: Some(Json(GameAccount {
                username: "ct-user".to_string(),
                password: "ct-pass".to_string(),
                encryption_key_id: "v1".to_string(),
            })),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["gameAccount"]["encryptionKeyId"], "v1");
        assert_eq!(json["productCode"], "PJSK-001");
    }

    #[test]
    fn validate_rejects_too_many_images() {
        let mut req = sample_request();
        req.images = (0..5).map(|i| format!("img-{}.jpg", i)).collect();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_requires_thumbnail_before_publish() {
        let mut req = sample_request();
        req.thumbnail_image = None;
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        // discontinued products may stay without a thumbnail
        req.status = ProductStatus::Discontinued;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validate_parses_decimal_price() {
        let mut req = sample_request();
        assert_eq!(req.validate().unwrap(), Decimal::from(500_000));

        req.price = "abc".to_string();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        req.price = "0".to_string();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }
}
