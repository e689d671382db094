use serde::{Deserialize, Serialize};

/// Bank-transfer display fields returned by the payment backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BankInfo {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

/// Linear checkout progression; the only way back to `Form` is a new
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    Form,
    Payment,
    Success,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutConfirmRequest {
    pub order_id: String,
    pub product_code: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutConfirmResponse {
    pub order_id: String,
    pub order_code: String,
    pub qr_code: String,
    pub bank_info: BankInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStatusResponse {
    pub payment_step: CheckoutStep,
    pub payment_status: PaymentStatus,
}

/// `payment/create` result minted by the external backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub order_code: String,
    pub qr_code: String,
    pub bank_info: BankInfo,
}
