use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::Form;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    json_str, required, response_json, ProviderKind, UploadOutcome, UploadRequest, Uploader,
};
use crate::config::SmmsConfig;
use crate::error::{Error, Result};

const KIND: ProviderKind = ProviderKind::Smms;

/// SM.MS reports a duplicate upload as a failure but still hands back the
/// existing image URL.
const CODE_IMAGE_REPEATED: &str = "image_repeated";

/// Upload to sm.ms.
pub struct SmmsUploader {
    client: Client,
    token: String,
    endpoint: String,
}

impl std::fmt::Debug for SmmsUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmmsUploader")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl SmmsUploader {
    /// Build from the `[upload.smms]` section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] without a token.
    pub fn new(client: Client, config: &SmmsConfig) -> Result<Self> {
        Ok(Self {
            client,
            token: required(config.token.as_ref(), KIND)?,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Uploader for SmmsUploader {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome> {
        let form = Form::new()
            .part("smfile", request.part()?)
            .text("format", "json");

        debug!(endpoint = %self.endpoint, file = %request.file_name, "Uploading to sm.ms");
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.token.as_str())
            .multipart(form)
            .send()
            .await?;
        let (status, body) = response_json(KIND, response).await?;

        let succeeded = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        if status.is_success() && succeeded {
            let url = json_str(&body, "data.url")
                .ok_or_else(|| Error::upload(KIND, "response has no data.url"))?;
            return Ok(UploadOutcome {
                provider: KIND,
                url: url.to_string(),
                delete_url: json_str(&body, "data.delete").map(String::from),
            });
        }

        if json_str(&body, "code") == Some(CODE_IMAGE_REPEATED) {
            if let Some(url) = json_str(&body, "images") {
                info!(url, "sm.ms already has this image");
                return Ok(UploadOutcome {
                    provider: KIND,
                    url: url.to_string(),
                    delete_url: None,
                });
            }
        }

        let message = json_str(&body, "message")
            .map_or_else(|| format!("HTTP {status}"), String::from);
        Err(Error::upload(KIND, message))
    }
}
