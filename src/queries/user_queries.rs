use sqlx::PgPool;

use crate::{
    error::Result,
    models::{UserProfile, UserRole},
};

pub async fn create_profile(
    pool: &PgPool,
    uid: &str,
    email: &str,
    username: &str,
    role: UserRole,
) -> Result<UserProfile> {
    let profile = sqlx::query_as::<_, UserProfile>(
        "INSERT INTO users (uid, email, username, role, email_verified)
         VALUES ($1, $2, $3, $4, TRUE)
         RETURNING *",
    )
    .bind(uid)
    .bind(email)
    .bind(username)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(profile)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserProfile>> {
    let profile = sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(profile)
}

pub async fn find_by_uid(pool: &PgPool, uid: &str) -> Result<Option<UserProfile>> {
    let profile = sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE uid = $1")
        .bind(uid)
        .fetch_optional(pool)
        .await?;

    Ok(profile)
}

/// Resolves the role for a principal. Any lookup failure degrades to
/// `User`: fail-closed for privilege, fail-open for basic access.
pub async fn role_of(pool: &PgPool, uid: &str) -> UserRole {
    match find_by_uid(pool, uid).await {
        Ok(Some(profile)) => profile.role,
        Ok(None) => UserRole::User,
        Err(e) => {
            tracing::error!("Role lookup failed for uid {}: {}", uid, e);
            UserRole::User
        }
    }
}
