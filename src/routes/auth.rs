use axum::{
    Json,
    extract::{Query, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{
        ApiResponse, CompleteRegistrationRequest, CountdownResponse, EmailQuery, RegisterRequest,
        RegisterResponse, ResendOtpRequest, UserRole, VerificationStatusResponse, VerifyOtpRequest,
        VerifyOtpResponse,
    },
    queries::user_queries,
    services::{email::send_otp_email, otp::OtpError},
};

fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AppError::Validation(
            "Địa chỉ email không hợp lệ".to_string(),
        ));
    }
    Ok(())
}

/// First registration phase: issue an OTP for the email. An existing
/// session is superseded and reported as a resend.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<RegisterResponse>>> {
    validate_email(&payload.email)?;

    if payload.username.trim().is_empty() {
        return Err(AppError::Validation(
            "Tên người dùng là bắt buộc".to_string(),
        ));
    }

    if user_queries::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Email này đã được đăng ký".to_string()));
    }

    let outcome = state.otp_store.request(&payload.email, &payload.username);

    send_otp_email(
        &state.ses_client,
        &payload.email,
        &outcome.code,
        &state.sender_email,
    )
    .await?;

    tracing::info!(
        "OTP sent to {} (resend: {})",
        payload.email,
        outcome.is_resend
    );

    Ok(Json(ApiResponse::ok(RegisterResponse {
        email: payload.email,
        is_resend: outcome.is_resend,
    })))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<VerifyOtpResponse>>> {
    validate_email(&payload.email)?;

    let code = payload.otp.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Vui lòng nhập đầy đủ 6 số OTP".to_string(),
        ));
    }

    match state.otp_store.verify(&payload.email, code) {
        Ok(username) => {
            tracing::info!("Email verified for {}", payload.email);
            Ok(Json(ApiResponse::ok(VerifyOtpResponse {
                email: payload.email,
                username,
            })))
        }
        Err(OtpError::NoSession) => Err(AppError::NotFound(
            "Không tìm thấy yêu cầu đăng ký cho email này".to_string(),
        )),
        // wrong code and expired code are logged distinctly but share one
        // user-facing failure
        Err(OtpError::InvalidCode) => {
            tracing::warn!("Invalid OTP attempt for {}", payload.email);
            Err(AppError::Unauthorized(
                "Mã OTP không đúng hoặc đã hết hạn".to_string(),
            ))
        }
        Err(OtpError::Expired) => {
            tracing::warn!("Expired OTP attempt for {}", payload.email);
            Err(AppError::Unauthorized(
                "Mã OTP không đúng hoặc đã hết hạn".to_string(),
            ))
        }
        Err(OtpError::CooldownActive { .. }) => Err(AppError::InternalError(
            "Unexpected OTP state".to_string(),
        )),
    }
}

pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpRequest>,
) -> Result<Json<ApiResponse<()>>> {
    validate_email(&payload.email)?;

    match state.otp_store.resend(&payload.email) {
        Ok(code) => {
            send_otp_email(&state.ses_client, &payload.email, &code, &state.sender_email).await?;
            tracing::info!("OTP resent to {}", payload.email);
            Ok(Json(ApiResponse::message(
                "OTP mới đã được gửi đến email của bạn",
            )))
        }
        Err(OtpError::CooldownActive { remaining_seconds }) => Err(AppError::Validation(format!(
            "Vui lòng đợi {} giây trước khi gửi lại mã",
            remaining_seconds
        ))),
        Err(_) => Err(AppError::NotFound(
            "Không tìm thấy yêu cầu đăng ký cho email này".to_string(),
        )),
    }
}

/// Sign-in reads this before password authentication proceeds.
pub async fn check_verification(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
) -> Result<Json<ApiResponse<VerificationStatusResponse>>> {
    validate_email(&params.email)?;

    let verified = match user_queries::find_by_email(&state.db, &params.email).await? {
        Some(profile) => profile.email_verified,
        None => state.otp_store.is_verified(&params.email),
    };

    Ok(Json(ApiResponse::ok(VerificationStatusResponse { verified })))
}

/// Final registration phase, called once the identity-provider account
/// exists: creates the profile and consumes the OTP session. Idempotent —
/// a repeat call after completion is a no-op.
pub async fn complete_registration(
    State(state): State<AppState>,
    Json(payload): Json<CompleteRegistrationRequest>,
) -> Result<Json<ApiResponse<()>>> {
    validate_email(&payload.email)?;

    if user_queries::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        state.otp_store.complete(&payload.email);
        return Ok(Json(ApiResponse::message("Đăng ký đã hoàn tất")));
    }

    if !state.otp_store.is_verified(&payload.email) {
        return Err(AppError::Validation(
            "Email chưa được xác thực".to_string(),
        ));
    }

    let username = state
        .otp_store
        .username_of(&payload.email)
        .unwrap_or_else(|| payload.email.clone());

    // the single owner identity is seeded from configuration, never by a
    // later code path
    let role = if payload.email == state.auth.owner_email {
        UserRole::Owner
    } else {
        UserRole::User
    };

    let uid = Uuid::new_v4().to_string();
    user_queries::create_profile(&state.db, &uid, &payload.email, &username, role).await?;

    state.otp_store.complete(&payload.email);

    tracing::info!("Registration completed for {}", payload.email);

    Ok(Json(ApiResponse::message("Đăng ký thành công")))
}

pub async fn resend_countdown(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
) -> Result<Json<ApiResponse<CountdownResponse>>> {
    validate_email(&params.email)?;

    Ok(Json(ApiResponse::ok(CountdownResponse {
        countdown: state.otp_store.resend_countdown(&params.email),
    })))
}
