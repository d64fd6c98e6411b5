//! Artifact upload collaborator

use crate::ReportError;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Forwards a written artifact to an external endpoint.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<(), ReportError>;
}

/// Multipart HTTP uploader posting artifacts to `<base-url>/<site-id>`.
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(base_url: &str, site_id: &str) -> Self {
        let endpoint = format!("{}/{}", base_url.trim_end_matches('/'), site_id);
        info!(endpoint, "artifact uploads enabled");
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, path: &Path) -> Result<(), ReportError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReportError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::Upload(format!(
                "{} returned {}",
                self.endpoint,
                response.status()
            )));
        }
        debug!(file = file_name, "artifact uploaded");
        Ok(())
    }
}
