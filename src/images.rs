#![cfg(feature = "web")]
//! Image hosting client (upload, delete by token)

use log::{info, warn};
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;

use crate::config::ImageConfig;
use crate::error::{NackError, Result};
use crate::models::HostedImage;

/// Largest accepted upload
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    #[serde(default)]
    delete_token: Option<String>,
}

#[derive(Clone)]
pub struct ImageHost {
    client: Client,
    config: ImageConfig,
}

impl ImageHost {
    pub fn new(client: Client, config: ImageConfig) -> Self {
        Self { client, config }
    }

    /// Upload an image with the unsigned preset
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<HostedImage> {
        if bytes.is_empty() {
            return Err(NackError::invalid("the image is empty"));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(NackError::invalid("the image is larger than 5 MB"));
        }
        if !content_type.starts_with("image/") {
            return Err(NackError::invalid(format!(
                "{} is not an image type",
                content_type
            )));
        }

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new()
            .text("upload_preset", self.config.upload_preset.clone())
            .part("file", part);

        let response = self
            .client
            .post(&self.config.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Image upload of {} failed with {}", file_name, status);
            return Err(NackError::Upstream(format!("image host returned {}", status)));
        }

        let uploaded: UploadResponse = response.json().await?;
        info!("Uploaded {} to {}", file_name, uploaded.secure_url);
        Ok(HostedImage {
            url: uploaded.secure_url,
            delete_token: uploaded.delete_token,
        })
    }

    /// Delete an image with the token returned at upload time
    pub async fn delete(&self, token: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.config.delete_url)
            .form(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Image deletion failed with {}", status);
            return Err(NackError::Upstream(format!("image host returned {}", status)));
        }
        Ok(())
    }

    /// Best-effort removal of a replaced image; failures are only logged
    pub async fn discard(&self, image: Option<&HostedImage>) {
        let Some(token) = image.and_then(|i| i.delete_token.as_deref()) else {
            return;
        };
        if let Err(e) = self.delete(token).await {
            warn!("Could not delete replaced image: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> ImageHost {
        ImageHost::new(Client::new(), crate::config::Config::default().images)
    }

    #[tokio::test]
    async fn rejects_bad_uploads_locally() {
        let host = host();
        assert!(host.upload(Vec::new(), "a.png", "image/png").await.is_err());
        assert!(host.upload(vec![1, 2, 3], "a.pdf", "application/pdf").await.is_err());
        assert!(
            host.upload(vec![0; MAX_IMAGE_BYTES + 1], "a.png", "image/png")
                .await
                .is_err()
        );
    }
}
