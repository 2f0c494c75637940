//! Direct commit flow: read the current blob SHA, then write once.

use std::sync::Arc;
use tracing::{error, info};

use crate::branch::direct_commit_message;
use crate::config::RepositoryCoordinates;
use crate::error::{PipelineError, Stage};
use crate::github_client::RepositoryClient;
use crate::models::{DirectCommitResult, FileWriteIntent, ManifestSubmission};

/// Publishes a manifest straight to the base branch.
#[derive(Clone)]
pub struct DirectCommitOrchestrator {
    client: Arc<dyn RepositoryClient>,
    repository: Arc<RepositoryCoordinates>,
}

impl DirectCommitOrchestrator {
    #[must_use]
    pub fn new(client: Arc<dyn RepositoryClient>, repository: Arc<RepositoryCoordinates>) -> Self {
        Self { client, repository }
    }

    /// Run `READ_CURRENT_SHA -> WRITE_FILE` for one submission.
    ///
    /// A missing file is not an error; any other failure ends the run as-is.
    /// A conflict on write is returned without retrying.
    pub async fn run(
        &self,
        submission: &ManifestSubmission,
    ) -> Result<DirectCommitResult, PipelineError> {
        let branch = &self.repository.base_branch;
        let path = &self.repository.file_path;

        let prior_sha = match self.client.get_file_metadata(branch, path).await {
            Ok(metadata) => metadata.sha,
            Err(e) if e.is_not_found() => {
                info!(branch = %branch, path = %path, "Manifest file does not exist yet");
                None
            }
            Err(e) => {
                error!(stage = %Stage::ReadCurrentSha, error = %e, "Direct commit failed");
                return Err(PipelineError::remote(Stage::ReadCurrentSha, e));
            }
        };

        let intent = FileWriteIntent {
            branch: branch.clone(),
            path: path.clone(),
            content: submission.manifest_text()?.into_bytes(),
            commit_message: direct_commit_message(submission),
            prior_sha,
        };

        let outcome = self.client.upsert_file(&intent).await.map_err(|e| {
            error!(stage = %Stage::WriteFile, error = %e, "Direct commit failed");
            PipelineError::remote(Stage::WriteFile, e)
        })?;

        info!(
            branch = %branch,
            commit_hash = %submission.commit_hash,
            "Manifest committed directly"
        );

        Ok(DirectCommitResult {
            commit_info: outcome.commit,
            content_info: outcome.content,
        })
    }
}
