use reqwest::Client;
use tracing::{info, warn};

use super::{
    CloudinaryUploader, CustomUploader, GithubUploader, ImgurUploader, ProviderKind,
    SmmsUploader, UploadOutcome, UploadRequest, Uploader,
};
use crate::config::UploadConfig;
use crate::error::{Error, Result};

/// Tries each configured provider in turn until one accepts the file.
pub struct UploadManager {
    uploaders: Vec<Box<dyn Uploader>>,
}

impl std::fmt::Debug for UploadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadManager")
            .field("providers", &self.providers())
            .finish()
    }
}

fn http_client(config: &UploadConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.timeout())
        .user_agent(concat!("eaglelink/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn build_uploader(
    client: Client,
    config: &UploadConfig,
    kind: ProviderKind,
) -> Result<Box<dyn Uploader>> {
    Ok(match kind {
        ProviderKind::Imgur => Box::new(ImgurUploader::new(client, &config.imgur)?),
        ProviderKind::Smms => Box::new(SmmsUploader::new(client, &config.smms)?),
        ProviderKind::Github => Box::new(GithubUploader::new(client, &config.github)?),
        ProviderKind::Cloudinary => {
            Box::new(CloudinaryUploader::new(client, &config.cloudinary)?)
        }
        ProviderKind::Custom => Box::new(CustomUploader::new(client, &config.custom)?),
    })
}

impl UploadManager {
    /// Create a manager over an explicit list of uploaders, tried in order.
    #[must_use]
    pub fn new(uploaders: Vec<Box<dyn Uploader>>) -> Self {
        Self { uploaders }
    }

    /// Build the default provider and its fallbacks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoProviderConfigured`] when no provider is selected,
    /// or [`Error::ProviderNotConfigured`] when a selected provider lacks
    /// credentials.
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        let order = config.provider_order();
        if order.is_empty() {
            return Err(Error::NoProviderConfigured);
        }

        let client = http_client(config)?;
        let uploaders = order
            .into_iter()
            .map(|kind| build_uploader(client.clone(), config, kind))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(uploaders))
    }

    /// Build a manager restricted to one provider, ignoring the failover order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] when the provider lacks
    /// credentials.
    pub fn with_provider(config: &UploadConfig, kind: ProviderKind) -> Result<Self> {
        let client = http_client(config)?;
        Ok(Self::new(vec![build_uploader(client, config, kind)?]))
    }

    /// Providers in the order they will be tried.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderKind> {
        self.uploaders.iter().map(|u| u.kind()).collect()
    }

    /// Upload a file, falling through to the next provider on failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllProvidersFailed`] listing every attempt when no
    /// provider succeeds.
    pub async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome> {
        if self.uploaders.is_empty() {
            return Err(Error::NoProviderConfigured);
        }

        let mut attempts = Vec::with_capacity(self.uploaders.len());
        for uploader in &self.uploaders {
            let kind = uploader.kind();
            match uploader.upload(request).await {
                Ok(outcome) => {
                    info!(provider = %kind, url = %outcome.url, file = %request.file_name, "Uploaded");
                    return Ok(outcome);
                }
                Err(e) => {
                    warn!(provider = %kind, error = %e, "Upload failed, trying next provider");
                    let message = match e {
                        Error::Upload { message, .. } => message,
                        other => other.to_string(),
                    };
                    attempts.push((kind, message));
                }
            }
        }

        Err(Error::AllProvidersFailed { attempts })
    }
}
