//! GitHub REST client for the single configured repository.
//!
//! [`RepositoryClient`] is the seam the orchestrators depend on;
//! [`GitHubClient`] implements it over reqwest. Failures leave this module
//! only as classified [`RemoteError`]s.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{Config, RepositoryCoordinates};
use crate::error::{
    classify, is_pull_request_already_exists, is_reference_already_exists, Operation,
    RemoteError, TransportOutcome,
};
use crate::models::{
    BranchCreationIntent, FileMetadata, FileWriteIntent, PullRequestOutcome, PullRequestStatus,
    WriteOutcome,
};

/// Remote operations against the configured repository.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Blob metadata of `path` on `branch`. Absence is a `NotFound` error.
    async fn get_file_metadata(&self, branch: &str, path: &str)
        -> Result<FileMetadata, RemoteError>;

    /// Create or update a file. A set `prior_sha` makes the write conditional.
    async fn upsert_file(&self, intent: &FileWriteIntent) -> Result<WriteOutcome, RemoteError>;

    /// Commit SHA at the head of `branch`.
    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, RemoteError>;

    /// Create a branch. An existing branch of the same name counts as success.
    async fn create_branch(&self, intent: &BranchCreationIntent) -> Result<(), RemoteError>;

    /// Open a PR from `head` into `base`. An existing PR counts as success.
    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestOutcome, RemoteError>;
}

/// Request to create or update file contents.
#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Request to create a git ref.
#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

/// Request to open a pull request.
#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

/// GitHub API client bound to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    api_url: String,
    web_url: String,
    repository: RepositoryCoordinates,
}

impl GitHubClient {
    /// Create a client from service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("manifest-sync/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            token: config.github_token.clone(),
            api_url: config.api_url.clone(),
            web_url: config.web_url.clone(),
            repository: config.repository.clone(),
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{suffix}",
            self.api_url, self.repository.owner, self.repository.name
        )
    }

    fn contents_url(&self, path: &str) -> String {
        self.repo_url(&format!("contents/{}", path.trim_start_matches('/')))
    }

    /// Search link for an open PR, used when GitHub won't return the existing one.
    fn pull_request_search_url(&self, head: &str, base: &str) -> String {
        let pulls = format!(
            "{}/{}/{}/pulls",
            self.web_url, self.repository.owner, self.repository.name
        );
        let query = format!("is:pr is:open head:{head} base:{base}");
        match Url::parse(&pulls) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("q", &query);
                url.into()
            }
            Err(e) => {
                warn!(url = %pulls, error = %e, "Invalid GitHub web URL for PR search link");
                pulls
            }
        }
    }

    /// Send with credentials. Transport failures are classified here.
    async fn send(
        &self,
        request: RequestBuilder,
        op: Operation<'_>,
    ) -> Result<Response, RemoteError> {
        request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| classify(TransportOutcome::Unreachable(e.to_string()), op))
    }

    /// Turn a non-2xx response into a classified error.
    async fn status_error(response: Response, op: Operation<'_>) -> RemoteError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        classify(TransportOutcome::Status { status, body }, op)
    }

    async fn parse<T: DeserializeOwned>(
        response: Response,
        op: Operation<'_>,
    ) -> Result<T, RemoteError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(TransportOutcome::Unreachable(e.to_string()), op))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| classify(TransportOutcome::Malformed(e.to_string()), op))
    }
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    async fn get_file_metadata(
        &self,
        branch: &str,
        path: &str,
    ) -> Result<FileMetadata, RemoteError> {
        let op = Operation::ReadFile { branch };
        let request = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", branch)]);
        let response = self.send(request, op).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, op).await);
        }

        let metadata: FileMetadata = Self::parse(response, op).await?;
        debug!(branch = %branch, path = %path, sha = ?metadata.sha, "Read file metadata");
        Ok(metadata)
    }

    async fn upsert_file(&self, intent: &FileWriteIntent) -> Result<WriteOutcome, RemoteError> {
        let op = Operation::WriteFile {
            branch: &intent.branch,
        };
        let payload = PutContentsRequest {
            message: &intent.commit_message,
            content: STANDARD.encode(&intent.content),
            branch: &intent.branch,
            sha: intent.prior_sha.as_deref(),
        };
        let request = self.client.put(self.contents_url(&intent.path)).json(&payload);
        let response = self.send(request, op).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, op).await);
        }

        let outcome: WriteOutcome = Self::parse(response, op).await?;
        info!(
            branch = %intent.branch,
            path = %intent.path,
            conditional = intent.prior_sha.is_some(),
            "Wrote file to GitHub"
        );
        Ok(outcome)
    }

    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, RemoteError> {
        let op = Operation::GetBranchHead { branch };
        let request = self
            .client
            .get(self.repo_url(&format!("git/refs/heads/{branch}")));
        let response = self.send(request, op).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, op).await);
        }

        let reference: RefResponse = Self::parse(response, op).await?;
        Ok(reference.object.sha)
    }

    async fn create_branch(&self, intent: &BranchCreationIntent) -> Result<(), RemoteError> {
        let op = Operation::CreateBranch {
            branch: &intent.new_branch_name,
        };
        let payload = CreateRefRequest {
            ref_name: format!("refs/heads/{}", intent.new_branch_name),
            sha: &intent.base_commit_sha,
        };
        let request = self.client.post(self.repo_url("git/refs")).json(&payload);
        let response = self.send(request, op).await?;

        if response.status().is_success() {
            info!(
                branch = %intent.new_branch_name,
                sha = %intent.base_commit_sha,
                "Created branch"
            );
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if is_reference_already_exists(status, &body) {
            info!(branch = %intent.new_branch_name, "Branch already exists, proceeding");
            return Ok(());
        }
        Err(classify(TransportOutcome::Status { status, body }, op))
    }

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestOutcome, RemoteError> {
        let op = Operation::CreatePullRequest { head, base };
        let payload = CreatePullRequest {
            title,
            body,
            head,
            base,
            draft: false,
        };
        let request = self.client.post(self.repo_url("pulls")).json(&payload);
        let response = self.send(request, op).await?;

        if response.status().is_success() {
            let details: Value = Self::parse(response, op).await?;
            let html_url = details
                .get("html_url")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    classify(
                        TransportOutcome::Malformed("missing field `html_url`".to_string()),
                        op,
                    )
                })?;
            info!(head = %head, base = %base, url = %html_url, "Opened pull request");
            return Ok(PullRequestOutcome {
                status: PullRequestStatus::Created,
                html_url,
                details,
            });
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        if is_pull_request_already_exists(status, &text) {
            info!(head = %head, base = %base, "Pull request already exists");
            let html_url = self.pull_request_search_url(head, base);
            let message = format!("Pull request from '{head}' to '{base}' already exists.");
            return Ok(PullRequestOutcome {
                status: PullRequestStatus::AlreadyExists,
                details: json!({
                    "message": message,
                    "html_url": html_url,
                    "status": PullRequestStatus::AlreadyExists,
                }),
                html_url,
            });
        }
        Err(classify(TransportOutcome::Status { status, body: text }, op))
    }
}
