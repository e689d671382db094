use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    error::AppError,
    models::{OwnerContext, UserRole},
    queries::user_queries,
};

pub const OWNER_UID_HEADER: &str = "x-owner-uid";

/// Role gate for owner-only routes. The role is re-verified against the
/// database on every call; a client-presented role claim is never trusted.
/// On success an [`OwnerContext`] is placed in the request extensions for
/// downstream handlers.
pub async fn require_owner(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let uid = req
        .headers()
        .get(OWNER_UID_HEADER)
        .and_then(|header| header.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Yêu cầu đăng nhập chủ cửa hàng".to_string()))?;

    let role = user_queries::role_of(&state.db, &uid).await;

    if role != UserRole::Owner {
        return Err(AppError::Forbidden(
            "Chỉ chủ cửa hàng mới có quyền truy cập".to_string(),
        ));
    }

    req.extensions_mut().insert(OwnerContext { uid });

    Ok(next.run(req).await)
}
