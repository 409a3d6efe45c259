use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{
    json_str, required, response_json, ProviderKind, UploadOutcome, UploadRequest, Uploader,
};
use crate::config::GithubConfig;
use crate::error::{Error, Result};

const KIND: ProviderKind = ProviderKind::Github;

/// Commit images into a GitHub repository.
pub struct GithubUploader {
    client: Client,
    token: String,
    owner: String,
    repo: String,
    branch: String,
    dir: String,
    custom_url: Option<String>,
    message: String,
    api_url: String,
}

impl std::fmt::Debug for GithubUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubUploader")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl GithubUploader {
    /// Build from the `[upload.github]` section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderNotConfigured`] without token, owner or repo.
    pub fn new(client: Client, config: &GithubConfig) -> Result<Self> {
        Ok(Self {
            client,
            token: required(config.token.as_ref(), KIND)?,
            owner: required(config.owner.as_ref(), KIND)?,
            repo: required(config.repo.as_ref(), KIND)?,
            branch: config.branch.clone(),
            dir: config.path.trim_matches('/').to_string(),
            custom_url: config.custom_url.clone().filter(|u| !u.trim().is_empty()),
            message: config.message.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Path of the file inside the repository.
    fn repo_path(&self, file_name: &str) -> String {
        if self.dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{file_name}", self.dir)
        }
    }

    fn contents_url(&self, repo_path: &str) -> String {
        let encoded = repo_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/repos/{}/{}/contents/{encoded}",
            self.api_url, self.owner, self.repo
        )
    }

    /// Public URL from the configured template.
    fn public_url(&self, template: &str, repo_path: &str) -> String {
        template
            .replace("{owner}", &self.owner)
            .replace("{repo}", &self.repo)
            .replace("{branch}", &self.branch)
            .replace("{path}", repo_path)
    }
}

#[async_trait]
impl Uploader for GithubUploader {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome> {
        let repo_path = self.repo_path(&request.file_name);
        let body = json!({
            "message": self.message.replace("{file}", &request.file_name),
            "content": STANDARD.encode(&request.bytes),
            "branch": self.branch,
        });

        debug!(owner = %self.owner, repo = %self.repo, path = %repo_path, "Uploading to GitHub");
        let response = self
            .client
            .put(self.contents_url(&repo_path))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("eaglelink/", env!("CARGO_PKG_VERSION")))
            .json(&body)
            .send()
            .await?;
        let (status, body) = response_json(KIND, response).await?;

        if !status.is_success() {
            let message = json_str(&body, "message")
                .map_or_else(|| format!("HTTP {status}"), |m| format!("{m} (HTTP {status})"));
            return Err(Error::upload(KIND, message));
        }

        let committed_path = json_str(&body, "content.path").unwrap_or(&repo_path);
        let url = match &self.custom_url {
            Some(template) => self.public_url(template, committed_path),
            None => json_str(&body, "content.download_url")
                .ok_or_else(|| Error::upload(KIND, "response has no content.download_url"))?
                .to_string(),
        };

        Ok(UploadOutcome {
            provider: KIND,
            url,
            delete_url: None,
        })
    }
}
