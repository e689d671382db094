use serde_json::json;

use crate::{
    error::{AppError, Result},
    models::{PaymentStatus, PaymentTransaction},
};

/// Client for the external bank-transfer payment backend. Each call is a
/// stateless request; status reads are safe to repeat.
#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    base_url: String,
}

impl PaymentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Mints a payment transaction: returns the server-issued order code,
    /// the QR image and the bank-transfer display fields.
    pub async fn create_transaction(
        &self,
        order_id: &str,
        amount: i64,
        product_code: &str,
        email: &str,
    ) -> Result<PaymentTransaction> {
        let request_body = json!({
            "orderId": order_id,
            "amount": amount,
            "productCode": product_code,
            "email": email,
        });

        let response = self
            .http
            .post(format!("{}/api/payment/create", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Payment create request failed: {}", e)))?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse payment response: {}", e))
        })?;

        if !body.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
            let error_message = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown payment backend error");
            return Err(AppError::ExternalService(format!(
                "Payment transaction creation failed: {}",
                error_message
            )));
        }

        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| AppError::ExternalService("Payment response missing data".to_string()))?;

        serde_json::from_value(data).map_err(|e| {
            AppError::ExternalService(format!("Invalid payment response format: {}", e))
        })
    }

    /// Reads the payment status for a minted transaction.
    pub async fn fetch_status(&self, order_code: &str) -> Result<PaymentStatus> {
        let response = self
            .http
            .get(format!("{}/api/payment/status/{}", self.base_url, order_code))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Payment status request failed: {}", e)))?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse payment status: {}", e))
        })?;

        let status = body
            .pointer("/data/status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::ExternalService("Payment status response missing status".to_string())
            })?;

        if status == "completed" {
            Ok(PaymentStatus::Completed)
        } else {
            Ok(PaymentStatus::Pending)
        }
    }
}
