use crate::error::{AppError, Result};

/// Client for the external image storage backend. Only deletion is needed
/// here: uploads go straight from the dashboard to the backend.
#[derive(Clone)]
pub struct ImageClient {
    http: reqwest::Client,
    base_url: String,
}

impl ImageClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn delete_image(&self, filename: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/api/images/{}", self.base_url, filename))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Image delete request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Image backend returned {} for {}",
                response.status(),
                filename
            )));
        }

        Ok(())
    }

    /// Best-effort cleanup when a product is removed; individual failures
    /// are logged, not propagated.
    pub async fn delete_images(&self, filenames: &[String]) {
        for filename in filenames {
            if let Err(e) = self.delete_image(filename).await {
                tracing::warn!("Failed to delete image {}: {}", filename, e);
            }
        }
    }
}
