// ABOUTME: Remote mirror adapter pushing project file trees to a source-control host
// ABOUTME: GitHub REST implementation: create repository if absent, upsert file contents

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::types::RemoteSyncOptions;

/// Push files to a remote source-control repository, creating it when absent
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Returns the repository URL, creating the repository when it does not exist
    async fn ensure_repository(&self, options: &RemoteSyncOptions) -> Result<String>;

    /// Create or update one file in the repository
    async fn push_file(&self, repo_name: &str, path: &str, content: &[u8], message: &str)
        -> Result<()>;
}

/// GitHub repository creation request
#[derive(Debug, Serialize)]
struct CreateRepoRequest {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    private: bool,
    auto_init: bool,
}

/// GitHub repository response
#[derive(Debug, Deserialize)]
struct RepoResponse {
    html_url: String,
}

/// GitHub contents response (only the sha matters for updates)
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

/// GitHub contents upsert request
#[derive(Debug, Serialize)]
struct PutContentsRequest {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// GitHub API error response
#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// GitHub-backed remote mirror
pub struct GitHubMirror {
    client: Client,
    api_url: String,
    owner: String,
    token: String,
}

impl GitHubMirror {
    pub fn new(api_url: String, owner: String, token: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            owner,
            token,
        }
    }

    fn repo_url(&self, repo_name: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.owner, repo_name)
    }

    fn auth_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "atelier")
    }

    async fn api_error(response: reqwest::Response) -> StorageError {
        let status = response.status();
        let message = response
            .json::<GitHubErrorResponse>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| "unreadable error body".to_string());
        StorageError::Mirror(format!("GitHub API {}: {}", status, message))
    }

    /// Existing file sha, if the path is already in the repository
    async fn existing_sha(&self, repo_name: &str, path: &str) -> Result<Option<String>> {
        let url = format!("{}/contents/{}", self.repo_url(repo_name), path);
        let response = self.auth_request(self.client.get(&url)).send().await?;

        match response.status() {
            StatusCode::OK => {
                let contents: ContentsResponse = response.json().await?;
                Ok(Some(contents.sha))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::api_error(response).await),
        }
    }
}

#[async_trait]
impl RemoteMirror for GitHubMirror {
    async fn ensure_repository(&self, options: &RemoteSyncOptions) -> Result<String> {
        let response = self
            .auth_request(self.client.get(self.repo_url(&options.repo_name)))
            .send()
            .await
            .map_err(|e| StorageError::BackendUnavailable(format!("GitHub unreachable: {}", e)))?;

        match response.status() {
            StatusCode::OK => {
                let repo: RepoResponse = response.json().await?;
                debug!("Repository {} already exists", options.repo_name);
                return Ok(repo.html_url);
            }
            StatusCode::NOT_FOUND => {}
            _ => return Err(Self::api_error(response).await),
        }

        info!("Creating mirror repository {}", options.repo_name);
        let request = CreateRepoRequest {
            name: options.repo_name.clone(),
            description: options.description.clone(),
            private: options.is_private,
            auto_init: true,
        };

        let response = self
            .auth_request(self.client.post(format!("{}/user/repos", self.api_url)))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let repo: RepoResponse = response.json().await?;
        Ok(repo.html_url)
    }

    async fn push_file(
        &self,
        repo_name: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<()> {
        let sha = self.existing_sha(repo_name, path).await?;
        let url = format!("{}/contents/{}", self.repo_url(repo_name), path);

        let request = PutContentsRequest {
            message: message.to_string(),
            content: BASE64.encode(content),
            sha,
        };

        let response = self
            .auth_request(self.client.put(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| StorageError::BackendUnavailable(format!("GitHub unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        debug!("Pushed {} to {}", path, repo_name);
        Ok(())
    }
}
