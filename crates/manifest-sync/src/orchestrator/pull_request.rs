//! Pull request flow.
//!
//! `RESOLVE_BASE -> CREATE_BRANCH -> COMMIT_TO_BRANCH -> OPEN_PR -> DONE`, with
//! an error exit from every state. Nothing is rolled back: a branch created
//! before a later failure stays, and the failing [`Stage`] says so.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::branch::{
    branch_commit_message, pull_request_body, pull_request_title, BranchNameGenerator,
};
use crate::config::RepositoryCoordinates;
use crate::error::{PipelineError, RemoteError, Stage};
use crate::github_client::RepositoryClient;
use crate::models::{BranchCreationIntent, FileWriteIntent, ManifestSubmission, PullRequestResult};

/// States of one pull request run.
#[derive(Debug, Clone, PartialEq)]
pub enum PrState {
    ResolveBase,
    CreateBranch { base_sha: String },
    CommitToBranch,
    OpenPullRequest { commit_info: Value },
}

impl PrState {
    /// Stage reported if this state fails.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::ResolveBase => Stage::ResolveBase,
            Self::CreateBranch { .. } => Stage::CreateBranch,
            Self::CommitToBranch => Stage::CommitToBranch,
            Self::OpenPullRequest { .. } => Stage::OpenPullRequest,
        }
    }
}

/// Result of running one state.
enum Transition {
    Next(PrState),
    Done(PullRequestResult),
}

/// Per-run values fixed before the state machine starts.
struct RunContext<'a> {
    submission: &'a ManifestSubmission,
    branch: String,
    manifest_text: String,
}

/// Publishes a manifest through a new branch and a pull request.
pub struct PullRequestOrchestrator<C = fn() -> DateTime<Utc>> {
    client: Arc<dyn RepositoryClient>,
    repository: Arc<RepositoryCoordinates>,
    branch_names: BranchNameGenerator<C>,
}

impl PullRequestOrchestrator {
    #[must_use]
    pub fn new(client: Arc<dyn RepositoryClient>, repository: Arc<RepositoryCoordinates>) -> Self {
        Self {
            client,
            repository,
            branch_names: BranchNameGenerator::default(),
        }
    }
}

impl<C> PullRequestOrchestrator<C>
where
    C: Fn() -> DateTime<Utc> + Send + Sync,
{
    /// Orchestrator with a custom branch name generator.
    pub fn with_branch_names(
        client: Arc<dyn RepositoryClient>,
        repository: Arc<RepositoryCoordinates>,
        branch_names: BranchNameGenerator<C>,
    ) -> Self {
        Self {
            client,
            repository,
            branch_names,
        }
    }

    /// Run the whole flow for one submission. No step is retried.
    pub async fn run(
        &self,
        submission: &ManifestSubmission,
    ) -> Result<PullRequestResult, PipelineError> {
        let ctx = RunContext {
            submission,
            branch: self.branch_names.generate(&submission.commit_hash),
            manifest_text: submission.manifest_text()?,
        };
        info!(
            branch = %ctx.branch,
            commit_hash = %submission.commit_hash,
            "Starting pull request flow"
        );

        let mut state = PrState::ResolveBase;
        loop {
            let stage = state.stage();
            debug!(branch = %ctx.branch, stage = %stage, "Entering state");

            match self.step(state, &ctx).await {
                Ok(Transition::Next(next)) => state = next,
                Ok(Transition::Done(result)) => {
                    info!(
                        branch = %result.new_branch_name,
                        status = ?result.status,
                        url = %result.pull_request_url,
                        "Pull request flow complete"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    error!(
                        branch = %ctx.branch,
                        stage = %stage,
                        error = %e,
                        "Pull request flow failed"
                    );
                    return Err(PipelineError::remote(stage, e));
                }
            }
        }
    }

    async fn step(&self, state: PrState, ctx: &RunContext<'_>) -> Result<Transition, RemoteError> {
        let base = &self.repository.base_branch;
        match state {
            PrState::ResolveBase => {
                let base_sha = self.client.get_branch_head_sha(base).await?;
                Ok(Transition::Next(PrState::CreateBranch { base_sha }))
            }
            PrState::CreateBranch { base_sha } => {
                let intent = BranchCreationIntent {
                    new_branch_name: ctx.branch.clone(),
                    base_commit_sha: base_sha,
                };
                self.client.create_branch(&intent).await?;
                Ok(Transition::Next(PrState::CommitToBranch))
            }
            PrState::CommitToBranch => {
                let intent = FileWriteIntent {
                    branch: ctx.branch.clone(),
                    path: self.repository.file_path.clone(),
                    content: ctx.manifest_text.clone().into_bytes(),
                    commit_message: branch_commit_message(ctx.submission),
                    prior_sha: self.prior_sha_on_branch(&ctx.branch).await,
                };
                let outcome = self.client.upsert_file(&intent).await?;
                Ok(Transition::Next(PrState::OpenPullRequest {
                    commit_info: outcome.commit,
                }))
            }
            PrState::OpenPullRequest { commit_info } => {
                let pr = self
                    .client
                    .create_pull_request(
                        &ctx.branch,
                        base,
                        &pull_request_title(ctx.submission),
                        &pull_request_body(ctx.submission, &ctx.manifest_text),
                    )
                    .await?;
                Ok(Transition::Done(PullRequestResult {
                    status: pr.status,
                    pull_request_url: pr.html_url,
                    pull_request_details: pr.details,
                    new_branch_name: ctx.branch.clone(),
                    commit_info,
                }))
            }
        }
    }

    /// Fresh read of the file on the new branch. Failures mean "no prior file".
    async fn prior_sha_on_branch(&self, branch: &str) -> Option<String> {
        let path = &self.repository.file_path;
        match self.client.get_file_metadata(branch, path).await {
            Ok(metadata) => metadata.sha,
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(
                    branch = %branch,
                    path = %path,
                    error = %e,
                    "Could not read file SHA on branch, assuming new file"
                );
                None
            }
        }
    }
}
