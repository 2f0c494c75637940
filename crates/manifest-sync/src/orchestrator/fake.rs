//! In-memory `RepositoryClient` that records every call.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{RemoteError, RemoteErrorKind};
use crate::github_client::RepositoryClient;
use crate::models::{
    BranchCreationIntent, FileMetadata, FileWriteIntent, PullRequestOutcome, PullRequestStatus,
    WriteOutcome,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    GetFileMetadata { branch: String, path: String },
    UpsertFile(FileWriteIntent),
    GetBranchHeadSha(String),
    CreateBranch(BranchCreationIntent),
    CreatePullRequest {
        head: String,
        base: String,
        title: String,
        body: String,
    },
}

#[derive(Default)]
pub(crate) struct FakeRepository {
    pub(crate) calls: Mutex<Vec<Call>>,
    /// Blob SHA of the file per branch; absent means 404.
    pub files: HashMap<String, String>,
    pub metadata_error: Option<RemoteError>,
    pub upsert_error: Option<RemoteError>,
    pub head_error: Option<RemoteError>,
    pub create_branch_error: Option<RemoteError>,
    pub pull_request: Option<Result<PullRequestOutcome, RemoteError>>,
}

impl FakeRepository {
    pub fn with_file(mut self, branch: &str, sha: &str) -> Self {
        self.files.insert(branch.to_string(), sha.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upserts(&self) -> Vec<FileWriteIntent> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UpsertFile(intent) => Some(intent),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub(crate) fn remote(kind: RemoteErrorKind, status: u16, message: &str) -> RemoteError {
    RemoteError::new(kind, Some(status), message)
}

#[async_trait]
impl RepositoryClient for FakeRepository {
    async fn get_file_metadata(
        &self,
        branch: &str,
        path: &str,
    ) -> Result<FileMetadata, RemoteError> {
        self.record(Call::GetFileMetadata {
            branch: branch.to_string(),
            path: path.to_string(),
        });
        if let Some(err) = &self.metadata_error {
            return Err(err.clone());
        }
        match self.files.get(branch) {
            Some(sha) => Ok(FileMetadata {
                sha: Some(sha.clone()),
            }),
            None => Err(remote(RemoteErrorKind::NotFound, 404, "Not Found")),
        }
    }

    async fn upsert_file(&self, intent: &FileWriteIntent) -> Result<WriteOutcome, RemoteError> {
        self.record(Call::UpsertFile(intent.clone()));
        if let Some(err) = &self.upsert_error {
            return Err(err.clone());
        }
        Ok(WriteOutcome {
            commit: json!({"sha": "newcommit", "message": intent.commit_message}),
            content: json!({"path": intent.path, "sha": "newblob"}),
        })
    }

    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, RemoteError> {
        self.record(Call::GetBranchHeadSha(branch.to_string()));
        match &self.head_error {
            Some(err) => Err(err.clone()),
            None => Ok("basesha".to_string()),
        }
    }

    async fn create_branch(&self, intent: &BranchCreationIntent) -> Result<(), RemoteError> {
        self.record(Call::CreateBranch(intent.clone()));
        match &self.create_branch_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestOutcome, RemoteError> {
        self.record(Call::CreatePullRequest {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        self.pull_request.clone().unwrap_or_else(|| {
            Ok(PullRequestOutcome {
                status: PullRequestStatus::Created,
                html_url: "https://github.com/acme/prompts/pull/7".to_string(),
                details: json!({"number": 7}),
            })
        })
    }
}
