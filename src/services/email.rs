use aws_sdk_sesv2::Client as SesClient;

use crate::error::{AppError, Result};

async fn send_html_email(
    ses_client: &SesClient,
    recipient: &str,
    sender_email: &str,
    subject: &str,
    html: String,
) -> Result<()> {
    let destination = aws_sdk_sesv2::types::Destination::builder()
        .to_addresses(recipient)
        .build();

    let subject = aws_sdk_sesv2::types::Content::builder()
        .data(subject)
        .charset("UTF-8")
        .build()
        .map_err(|e| AppError::InternalError(format!("Failed to build subject: {}", e)))?;

    let html_body = aws_sdk_sesv2::types::Content::builder()
        .data(html)
        .charset("UTF-8")
        .build()
        .map_err(|e| AppError::InternalError(format!("Failed to build HTML body: {}", e)))?;

    let body = aws_sdk_sesv2::types::Body::builder().html(html_body).build();

    let message = aws_sdk_sesv2::types::Message::builder()
        .subject(subject)
        .body(body)
        .build();

    let content = aws_sdk_sesv2::types::EmailContent::builder()
        .simple(message)
        .build();

    ses_client
        .send_email()
        .from_email_address(sender_email)
        .destination(destination)
        .content(content)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to send email: {:?}", e);
            AppError::ExternalService("Không thể gửi email".to_string())
        })?;

    Ok(())
}

pub async fn send_otp_email(
    ses_client: &SesClient,
    recipient: &str,
    code: &str,
    sender_email: &str,
) -> Result<()> {
    let html_template = include_str!("templates/otp_email.html");
    let html = html_template.replace("{{verification_code}}", code);

    send_html_email(
        ses_client,
        recipient,
        sender_email,
        "Mã xác thực đăng ký tài khoản",
        html,
    )
    .await
}

/// Out-of-band credential delivery after a completed payment. The caller
/// passes decrypted plaintext; nothing here touches storage.
pub async fn send_credentials_email(
    ses_client: &SesClient,
    recipient: &str,
    product_name: &str,
    game_username: &str,
    game_password: &str,
    sender_email: &str,
) -> Result<()> {
    let html_template = include_str!("templates/credentials_email.html");
    let html = html_template
        .replace("{{product_name}}", product_name)
        .replace("{{game_username}}", game_username)
        .replace("{{game_password}}", game_password);

    send_html_email(
        ses_client,
        recipient,
        sender_email,
        "Thông tin tài khoản game của bạn",
        html,
    )
    .await
}
