use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{GameAccount, ProductRequest, ProductWithCredentials},
};

pub async fn find_all(pool: &PgPool) -> Result<Vec<ProductWithCredentials>> {
    let products = sqlx::query_as::<_, ProductWithCredentials>(
        "SELECT * FROM products ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(products)
}

pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<ProductWithCredentials>> {
    let product = sqlx::query_as::<_, ProductWithCredentials>(
        "SELECT * FROM products WHERE product_code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

pub async fn find_by_type(
    pool: &PgPool,
    product_type: crate::models::ProductType,
) -> Result<Vec<ProductWithCredentials>> {
    let products = sqlx::query_as::<_, ProductWithCredentials>(
        "SELECT * FROM products WHERE product_type = $1 ORDER BY created_at DESC",
    )
    .bind(product_type)
    .fetch_all(pool)
    .await?;

    Ok(products)
}

pub async fn code_exists(pool: &PgPool, code: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE product_code = $1)")
            .bind(code)
            .fetch_one(pool)
            .await?;

    Ok(exists)
}

pub async fn insert(
    pool: &PgPool,
    payload: &ProductRequest,
    price: Decimal,
    game_account: Option<GameAccount>,
    created_by: &str,
) -> Result<ProductWithCredentials> {
    let product = sqlx::query_as::<_, ProductWithCredentials>(
        "INSERT INTO products
            (id, product_code, name, price, description, images, thumbnail_image,
             specifications, product_type, status, server, game_account, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&payload.product_code)
    .bind(&payload.name)
    .bind(price)
    .bind(&payload.description)
    .bind(&payload.images)
    .bind(&payload.thumbnail_image)
    .bind(Json(&payload.specifications))
    .bind(payload.product_type)
    .bind(payload.status)
    .bind(payload.server)
    .bind(game_account.map(Json))
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(product)
}

pub async fn update(
    pool: &PgPool,
    code: &str,
    payload: &ProductRequest,
    price: Decimal,
    game_account: Option<GameAccount>,
) -> Result<Option<ProductWithCredentials>> {
    let product = sqlx::query_as::<_, ProductWithCredentials>(
        "UPDATE products SET
            name = $2,
            price = $3,
            description = $4,
            images = $5,
            thumbnail_image = $6,
            specifications = $7,
            product_type = $8,
            status = $9,
            server = $10,
            game_account = COALESCE($11, game_account),
            updated_at = NOW()
         WHERE product_code = $1
         RETURNING *",
    )
    .bind(code)
    .bind(&payload.name)
    .bind(price)
    .bind(&payload.description)
    .bind(&payload.images)
    .bind(&payload.thumbnail_image)
    .bind(Json(&payload.specifications))
    .bind(payload.product_type)
    .bind(payload.status)
    .bind(payload.server)
    .bind(game_account.map(Json))
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

pub async fn delete(pool: &PgPool, code: &str) -> Result<()> {
    sqlx::query("DELETE FROM products WHERE product_code = $1")
        .bind(code)
        .execute(pool)
        .await?;

    Ok(())
}
