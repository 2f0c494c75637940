//! The two publishing flows.
//!
//! - [`DirectCommitOrchestrator`] writes the manifest straight to the base branch.
//! - [`PullRequestOrchestrator`] writes it to a fresh branch and opens a PR.
//!
//! Both run one submission end to end with no retries and no shared mutable
//! state; remote-side idempotency makes replaying a submission safe.

pub mod direct;
pub mod pull_request;

#[cfg(test)]
pub(crate) mod fake;

pub use direct::DirectCommitOrchestrator;
pub use pull_request::{PrState, PullRequestOrchestrator};

use std::sync::Arc;

use crate::config::RepositoryCoordinates;
use crate::error::PipelineError;
use crate::github_client::RepositoryClient;
use crate::models::{ManifestSubmission, OrchestrationResult};

/// How a submission is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    DirectCommit,
    PullRequest,
}

/// Routes a submission to the orchestrator for its mode.
pub struct Publisher {
    direct: DirectCommitOrchestrator,
    pull_requests: PullRequestOrchestrator,
}

impl Publisher {
    /// Wire both orchestrators to one client and repository.
    #[must_use]
    pub fn new(client: Arc<dyn RepositoryClient>, repository: Arc<RepositoryCoordinates>) -> Self {
        Self {
            direct: DirectCommitOrchestrator::new(client.clone(), repository.clone()),
            pull_requests: PullRequestOrchestrator::new(client, repository),
        }
    }

    pub async fn publish(
        &self,
        mode: PublishMode,
        submission: &ManifestSubmission,
    ) -> Result<OrchestrationResult, PipelineError> {
        match mode {
            PublishMode::DirectCommit => self
                .direct
                .run(submission)
                .await
                .map(OrchestrationResult::DirectCommit),
            PublishMode::PullRequest => self
                .pull_requests
                .run(submission)
                .await
                .map(OrchestrationResult::PullRequest),
        }
    }
}
