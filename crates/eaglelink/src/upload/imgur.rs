use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::Form;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{
    json_path, json_str, required, response_json, ProviderKind, UploadOutcome, UploadRequest,
    Uploader,
};
use crate::config::ImgurConfig;
use crate::error::{Error, Result};

const KIND: ProviderKind = ProviderKind::Imgur;

/// Anonymous upload to imgur.
pub struct ImgurUploader {
    client: Client,
    client_id: String,
    endpoint: String,
}

impl std::fmt::Debug for ImgurUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImgurUploader")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ImgurUploader {
    /// Build from the `[upload.imgur]` section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] without a client id.
    pub fn new(client: Client, config: &ImgurConfig) -> Result<Self> {
        Ok(Self {
            client,
            client_id: required(config.client_id.as_ref(), KIND)?,
            endpoint: config.endpoint.clone(),
        })
    }
}

fn error_message(body: &Value) -> Option<String> {
    let error = json_path(body, "data.error")?;
    error
        .as_str()
        .or_else(|| json_str(error, "message"))
        .map(String::from)
}

#[async_trait]
impl Uploader for ImgurUploader {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome> {
        let form = Form::new()
            .part("image", request.part()?)
            .text("type", "file")
            .text("name", request.file_name.clone());

        debug!(endpoint = %self.endpoint, file = %request.file_name, "Uploading to imgur");
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Client-ID {}", self.client_id))
            .multipart(form)
            .send()
            .await?;
        let (status, body) = response_json(KIND, response).await?;

        let succeeded = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !succeeded {
            let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
            return Err(Error::upload(KIND, message));
        }

        let url = json_str(&body, "data.link")
            .ok_or_else(|| Error::upload(KIND, "response has no data.link"))?;
        let delete_url =
            json_str(&body, "data.deletehash").map(|hash| format!("https://imgur.com/delete/{hash}"));

        Ok(UploadOutcome {
            provider: KIND,
            url: url.to_string(),
            delete_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader(endpoint: String) -> ImgurUploader {
        ImgurUploader::new(
            Client::new(),
            &ImgurConfig {
                client_id: Some("cid-123".to_string()),
                endpoint,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_new_requires_client_id() {
        let result = ImgurUploader::new(Client::new(), &ImgurConfig::default());
        assert!(matches!(result, Err(Error::ProviderNotConfigured(ProviderKind::Imgur))));
    }

    #[test]
    fn test_debug_hides_client_id() {
        let debug = format!("{:?}", uploader("https://api.imgur.com/3/image".to_string()));
        assert!(!debug.contains("cid-123"));
    }

    #[tokio::test]
    async fn test_upload_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/3/image")
            .match_header("authorization", "Client-ID cid-123")
            .match_body(mockito::Matcher::Regex("name=\"image\"".to_string()))
            .with_status(200)
            .with_body(
                r#"{"data":{"id":"orunSTu","link":"https://i.imgur.com/orunSTu.png","deletehash":"x70po4w7BVvSUzZ"},"success":true,"status":200}"#,
            )
            .create_async()
            .await;

        let outcome = uploader(format!("{}/3/image", server.url()))
            .upload(&UploadRequest::from_bytes(b"PNGDATA".to_vec(), "a.png"))
            .await
            .unwrap();

        assert_eq!(outcome.provider, ProviderKind::Imgur);
        assert_eq!(outcome.url, "https://i.imgur.com/orunSTu.png");
        assert_eq!(
            outcome.delete_url.as_deref(),
            Some("https://imgur.com/delete/x70po4w7BVvSUzZ")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/3/image")
            .with_status(400)
            .with_body(
                r#"{"data":{"error":"File type invalid (1)","request":"/3/image","method":"POST"},"success":false,"status":400}"#,
            )
            .create_async()
            .await;

        let err = uploader(format!("{}/3/image", server.url()))
            .upload(&UploadRequest::from_bytes(vec![1], "a.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "upload to imgur failed: File type invalid (1)");
    }

    #[tokio::test]
    async fn test_upload_nested_error_object() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/3/image")
            .with_status(429)
            .with_body(r#"{"data":{"error":{"code":429,"message":"Too Many Requests"}},"success":false}"#)
            .create_async()
            .await;

        let err = uploader(format!("{}/3/image", server.url()))
            .upload(&UploadRequest::from_bytes(vec![1], "a.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Too Many Requests"));
    }

    #[tokio::test]
    async fn test_upload_non_json_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/3/image")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = uploader(format!("{}/3/image", server.url()))
            .upload(&UploadRequest::from_bytes(vec![1], "a.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
    }
}
