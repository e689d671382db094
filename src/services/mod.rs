pub mod checkout;
pub mod crypto;
pub mod email;
pub mod images;
pub mod otp;
pub mod payment;
