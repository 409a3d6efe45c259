use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::Form;
use reqwest::Client;
use tracing::debug;

use super::{
    json_path, json_str, required, response_json, snippet, ProviderKind, UploadOutcome,
    UploadRequest, Uploader,
};
use crate::config::CustomConfig;
use crate::error::{Error, Result};

const KIND: ProviderKind = ProviderKind::Custom;

/// Upload to a user-defined endpoint.
///
/// The file goes out as a multipart part named `field_name`, next to any
/// configured form fields. The public URL is read from the JSON response
/// at `url_path`.
#[derive(Debug)]
pub struct CustomUploader {
    client: Client,
    url: String,
    field_name: String,
    headers: HeaderMap,
    form: Vec<(String, String)>,
    url_path: String,
}

impl CustomUploader {
    /// Build from the `[upload.custom]` section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] without a URL, or a
    /// validation error for a header that is not valid HTTP.
    pub fn new(client: Client, config: &CustomConfig) -> Result<Self> {
        let url = required(config.url.as_ref(), KIND)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::config_validation(format!("invalid header name '{name}': {e}"))
            })?;
            let mut value = HeaderValue::from_str(value).map_err(|e| {
                Error::config_validation(format!("invalid value for header '{name}': {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            url,
            field_name: config.field_name.clone(),
            headers,
            form: config
                .form
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            url_path: config.url_path.clone(),
        })
    }
}

#[async_trait]
impl Uploader for CustomUploader {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome> {
        let mut form = Form::new().part(self.field_name.clone(), request.part()?);
        for (key, value) in &self.form {
            form = form.text(key.clone(), value.clone());
        }

        debug!(url = %self.url, field = %self.field_name, file = %request.file_name, "Uploading to custom endpoint");
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await?;
        let (status, body) = response_json(KIND, response).await?;

        if !status.is_success() {
            let message = json_str(&body, "message")
                .or_else(|| json_str(&body, "error"))
                .map_or_else(
                    || format!("HTTP {status}: {}", snippet(&body.to_string())),
                    |m| format!("{m} (HTTP {status})"),
                );
            return Err(Error::upload(KIND, message));
        }

        let url = json_path(&body, &self.url_path)
            .and_then(serde_json::Value::as_str)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::upload(
                    KIND,
                    format!(
                        "no URL at '{}' in response: {}",
                        self.url_path,
                        snippet(&body.to_string())
                    ),
                )
            })?;

        Ok(UploadOutcome {
            provider: KIND,
            url: url.to_string(),
            delete_url: None,
        })
    }
}
