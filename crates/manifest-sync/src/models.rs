//! Request, intent and result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound webhook body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestSubmission {
    /// The content to publish. Must be a JSON object.
    pub manifest: Map<String, Value>,
    /// Correlation identifier of the triggering event. Not a git SHA.
    pub commit_hash: String,
    /// When the event was created. Carried through as-is.
    pub created_at: String,
}

impl ManifestSubmission {
    /// Manifest as pretty-printed JSON with 2-space indentation.
    pub fn manifest_text(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.manifest)
    }
}

/// One conditional write of a file on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWriteIntent {
    pub branch: String,
    pub path: String,
    /// Raw file content; encoded for transport by the client.
    pub content: Vec<u8>,
    pub commit_message: String,
    /// Blob SHA read just before this write. `None` creates the file.
    pub prior_sha: Option<String>,
}

/// A branch to create at a given commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCreationIntent {
    pub new_branch_name: String,
    pub base_commit_sha: String,
}

/// Metadata of an existing file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMetadata {
    /// Blob SHA. GitHub omits it for directory listings.
    #[serde(default)]
    pub sha: Option<String>,
}

/// Commit and content descriptors returned by a file write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    #[serde(default)]
    pub commit: Value,
    #[serde(default)]
    pub content: Value,
}

/// Outcome of a create-PR call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestStatus {
    Created,
    AlreadyExists,
}

/// A created or pre-existing pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestOutcome {
    pub status: PullRequestStatus,
    /// Direct PR URL, or a search URL when the PR already existed.
    pub html_url: String,
    /// GitHub's response body, or a synthesized record for an existing PR.
    pub details: Value,
}

/// Result of the direct commit flow.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectCommitResult {
    pub commit_info: Value,
    pub content_info: Value,
}

/// Result of the pull request flow.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestResult {
    pub status: PullRequestStatus,
    pub pull_request_url: String,
    pub pull_request_details: Value,
    pub new_branch_name: String,
    pub commit_info: Value,
}

/// Result of either flow.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationResult {
    DirectCommit(DirectCommitResult),
    PullRequest(PullRequestResult),
}
