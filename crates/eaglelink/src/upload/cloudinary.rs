use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::Form;
use reqwest::Client;
use sha1::{Digest, Sha1};
use tracing::debug;

use super::{
    json_str, required, response_json, ProviderKind, UploadOutcome, UploadRequest, Uploader,
};
use crate::config::CloudinaryConfig;
use crate::error::{Error, Result};

const KIND: ProviderKind = ProviderKind::Cloudinary;

/// Credentials for a signed upload.
#[derive(Clone)]
struct SignedAuth {
    api_key: String,
    api_secret: String,
}

/// Upload to Cloudinary.
///
/// With an API key and secret the request is signed; otherwise the
/// configured unsigned upload preset is used.
pub struct CloudinaryUploader {
    client: Client,
    cloud_name: String,
    upload_preset: Option<String>,
    folder: Option<String>,
    signed: Option<SignedAuth>,
    api_url: String,
}

impl std::fmt::Debug for CloudinaryUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryUploader")
            .field("cloud_name", &self.cloud_name)
            .field("upload_preset", &self.upload_preset)
            .field("signed", &self.signed.is_some())
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl CloudinaryUploader {
    /// Build from the `[upload.cloudinary]` section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] without a cloud name, or
    /// without either an upload preset or a key/secret pair.
    pub fn new(client: Client, config: &CloudinaryConfig) -> Result<Self> {
        let cloud_name = required(config.cloud_name.as_ref(), KIND)?;
        let upload_preset = non_blank(config.upload_preset.as_ref());
        let signed = match (
            non_blank(config.api_key.as_ref()),
            non_blank(config.api_secret.as_ref()),
        ) {
            (Some(api_key), Some(api_secret)) => Some(SignedAuth {
                api_key,
                api_secret,
            }),
            _ => None,
        };

        if signed.is_none() && upload_preset.is_none() {
            return Err(Error::ProviderNotConfigured(KIND));
        }

        Ok(Self {
            client,
            cloud_name,
            upload_preset,
            folder: non_blank(config.folder.as_ref()),
            signed,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1_1/{}/image/upload", self.api_url, self.cloud_name)
    }

    /// Form parameters other than the file, for a given timestamp.
    fn params(&self, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(folder) = &self.folder {
            params.push(("folder", folder.clone()));
        }
        if let Some(preset) = &self.upload_preset {
            params.push(("upload_preset", preset.clone()));
        }
        if let Some(auth) = &self.signed {
            let signature = sign(&params_with_timestamp(&params, timestamp), &auth.api_secret);
            params.push(("timestamp", timestamp.to_string()));
            params.push(("api_key", auth.api_key.clone()));
            params.push(("signature", signature));
        }
        params
    }
}

fn params_with_timestamp(
    params: &[(&'static str, String)],
    timestamp: i64,
) -> Vec<(&'static str, String)> {
    let mut signed = params.to_vec();
    signed.push(("timestamp", timestamp.to_string()));
    signed
}

/// SHA-1 signature over the sorted `key=value` pairs joined by `&`, with
/// the secret appended.
fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);
    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl Uploader for CloudinaryUploader {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome> {
        let mut form = Form::new().part("file", request.part()?);
        for (key, value) in self.params(Utc::now().timestamp()) {
            form = form.text(key, value);
        }

        debug!(
            cloud = %self.cloud_name,
            signed = self.signed.is_some(),
            file = %request.file_name,
            "Uploading to Cloudinary"
        );
        let response = self.client.post(self.endpoint()).multipart(form).send().await?;
        let (status, body) = response_json(KIND, response).await?;

        if !status.is_success() {
            let message = json_str(&body, "error.message")
                .map_or_else(|| format!("HTTP {status}"), String::from);
            return Err(Error::upload(KIND, message));
        }

        let url = json_str(&body, "secure_url")
            .or_else(|| json_str(&body, "url"))
            .ok_or_else(|| Error::upload(KIND, "response has no secure_url"))?;

        Ok(UploadOutcome {
            provider: KIND,
            url: url.to_string(),
            delete_url: json_str(&body, "delete_token").map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned(api_url: String) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: Some("demo".to_string()),
            upload_preset: Some("notes".to_string()),
            api_url,
            ..CloudinaryConfig::default()
        }
    }

    #[test]
    fn test_sign_sorts_params() {
        let params = vec![
            ("upload_preset", "signed".to_string()),
            ("timestamp", "1700000000".to_string()),
            ("folder", "notes".to_string()),
        ];
        assert_eq!(
            sign(&params, "secret"),
            "72ba9cfd32cd5389b7f22d04ce8d8763ee3ba263"
        );
    }

    #[test]
    fn test_signed_params() {
        let config = CloudinaryConfig {
            cloud_name: Some("demo".to_string()),
            api_key: Some("key".to_string()),
            api_secret: Some("secret".to_string()),
            ..CloudinaryConfig::default()
        };
        let uploader = CloudinaryUploader::new(Client::new(), &config).unwrap();
        let params = uploader.params(1_700_000_000);

        assert!(params.contains(&("api_key", "key".to_string())));
        assert!(params.contains(&("timestamp", "1700000000".to_string())));
        assert!(params.contains(&(
            "signature",
            "84af3c6077e429a8e7ff26d2ca13d5feb6bc7cb0".to_string()
        )));
    }

    #[test]
    fn test_unsigned_params() {
        let uploader =
            CloudinaryUploader::new(Client::new(), &unsigned("https://api.cloudinary.com".into()))
                .unwrap();
        assert_eq!(
            uploader.params(1),
            vec![("upload_preset", "notes".to_string())]
        );
        assert_eq!(
            uploader.endpoint(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_new_requires_preset_or_key_pair() {
        let config = CloudinaryConfig {
            cloud_name: Some("demo".to_string()),
            api_key: Some("key".to_string()),
            ..CloudinaryConfig::default()
        };
        assert!(matches!(
            CloudinaryUploader::new(Client::new(), &config),
            Err(Error::ProviderNotConfigured(ProviderKind::Cloudinary))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = CloudinaryConfig {
            cloud_name: Some("demo".to_string()),
            api_key: Some("key".to_string()),
            api_secret: Some("topsecret".to_string()),
            ..CloudinaryConfig::default()
        };
        let uploader = CloudinaryUploader::new(Client::new(), &config).unwrap();
        assert!(!format!("{uploader:?}").contains("topsecret"));
    }

    #[tokio::test]
    async fn test_upload_unsigned_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/image/upload")
            .match_body(mockito::Matcher::Regex("name=\"upload_preset\"".to_string()))
            .with_status(200)
            .with_body(
                r#"{"public_id":"notes/abc","secure_url":"https://res.cloudinary.com/demo/image/upload/v1/notes/abc.png","url":"http://res.cloudinary.com/demo/image/upload/v1/notes/abc.png"}"#,
            )
            .create_async()
            .await;

        let outcome = CloudinaryUploader::new(Client::new(), &unsigned(server.url()))
            .unwrap()
            .upload(&UploadRequest::from_bytes(b"PNGDATA".to_vec(), "abc.png"))
            .await
            .unwrap();
        assert_eq!(
            outcome.url,
            "https://res.cloudinary.com/demo/image/upload/v1/notes/abc.png"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1_1/demo/image/upload")
            .with_status(400)
            .with_body(r#"{"error":{"message":"Upload preset not found"}}"#)
            .create_async()
            .await;

        let err = CloudinaryUploader::new(Client::new(), &unsigned(server.url()))
            .unwrap()
            .upload(&UploadRequest::from_bytes(b"PNGDATA".to_vec(), "abc.png"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "upload to cloudinary failed: Upload preset not found"
        );
    }
}
