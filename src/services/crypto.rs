use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;

use crate::{
    config::EncryptionConfig,
    error::{AppError, Result},
};

/// Active key version. Stored per record so a future rotation can decrypt
/// mixed-version data without a backfill migration.
pub const ACTIVE_KEY_ID: &str = "v1";

const NONCE_SIZE: usize = 24;
const PLACEHOLDER_MAX: usize = 12;

/// Symmetric cipher for stored game-account credentials.
///
/// Stateless and safe for concurrent use; ciphertext layout is
/// `base64(nonce || aead_output)`.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: XChaCha20Poly1305,
    key_id: String,
}

impl CredentialCipher {
    pub fn from_config(config: &EncryptionConfig) -> Result<Self> {
        let key_bytes = BASE64
            .decode(&config.credential_key)
            .map_err(|_| AppError::ConfigError("CREDENTIAL_KEY is not valid base64".to_string()))?;

        if key_bytes.len() != 32 {
            return Err(AppError::ConfigError(
                "CREDENTIAL_KEY must decode to 32 bytes".to_string(),
            ));
        }

        let cipher = XChaCha20Poly1305::new_from_slice(&key_bytes)
            .map_err(|_| AppError::ConfigError("Invalid credential key length".to_string()))?;

        Ok(Self {
            cipher,
            key_id: ACTIVE_KEY_ID.to_string(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Encrypts one credential field. Blank plaintext passes through as an
    /// empty ciphertext tagged with the current key id.
    pub fn encrypt(&self, plaintext: &str) -> Result<(String, String)> {
        if plaintext.trim().is_empty() {
            return Ok((String::new(), self.key_id.clone()));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| AppError::InternalError("Failed to encrypt credential".to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok((BASE64.encode(combined), self.key_id.clone()))
    }

    /// Decrypts one credential field. Every failure mode (wrong key
    /// version, malformed ciphertext, authentication failure, invalid
    /// UTF-8) surfaces as the same generic error so callers cannot be used
    /// as a decryption oracle.
    pub fn decrypt(&self, ciphertext: &str, key_id: &str) -> Result<String> {
        if ciphertext.trim().is_empty() {
            return Ok(String::new());
        }

        if key_id != self.key_id {
            return Err(AppError::Decryption);
        }

        let combined = BASE64.decode(ciphertext).map_err(|_| AppError::Decryption)?;

        if combined.len() <= NONCE_SIZE {
            return Err(AppError::Decryption);
        }

        let (nonce, payload) = combined.split_at(NONCE_SIZE);

        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), payload)
            .map_err(|_| AppError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| AppError::Decryption)
    }
}

/// Masked stand-in shown when a credential cannot be decrypted.
pub fn secure_placeholder(original_length: usize) -> String {
    "•".repeat(original_length.min(PLACEHOLDER_MAX).max(1))
}
