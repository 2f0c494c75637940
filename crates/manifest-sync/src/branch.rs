//! Branch names and the text attached to commits and pull requests.

use chrono::{DateTime, Utc};

use crate::models::ManifestSubmission;

/// Number of correlation-id characters used in names and titles.
pub const SHORT_HASH_LEN: usize = 12;

const BRANCH_PREFIX: &str = "feature/prompt-";

/// First [`SHORT_HASH_LEN`] characters of a correlation id.
#[must_use]
pub fn short_hash(commit_hash: &str) -> &str {
    match commit_hash.char_indices().nth(SHORT_HASH_LEN) {
        Some((idx, _)) => &commit_hash[..idx],
        None => commit_hash,
    }
}

/// Derives per-submission branch names from the correlation id and a clock.
#[derive(Debug, Clone)]
pub struct BranchNameGenerator<C = fn() -> DateTime<Utc>> {
    clock: C,
}

impl Default for BranchNameGenerator {
    fn default() -> Self {
        Self { clock: Utc::now }
    }
}

impl<C> BranchNameGenerator<C>
where
    C: Fn() -> DateTime<Utc>,
{
    /// Generator reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// `feature/prompt-<short hash>-<YYYYMMDD-HHMMSS>` in UTC.
    pub fn generate(&self, commit_hash: &str) -> String {
        branch_name(commit_hash, (self.clock)())
    }
}

/// Branch name for a correlation id at a given instant.
#[must_use]
pub fn branch_name(commit_hash: &str, at: DateTime<Utc>) -> String {
    format!(
        "{BRANCH_PREFIX}{}-{}",
        short_hash(commit_hash),
        at.format("%Y%m%d-%H%M%S")
    )
}

/// Commit message for a write straight to the base branch.
#[must_use]
pub fn direct_commit_message(submission: &ManifestSubmission) -> String {
    format!(
        "feat: Update prompt manifest via webhook - commit {}",
        submission.commit_hash
    )
}

/// Commit message for the write on a PR branch.
#[must_use]
pub fn branch_commit_message(submission: &ManifestSubmission) -> String {
    format!(
        "feat: Update prompt manifest for PR ({})",
        short_hash(&submission.commit_hash)
    )
}

#[must_use]
pub fn pull_request_title(submission: &ManifestSubmission) -> String {
    format!(
        "feat: Update prompt manifest from webhook ({})",
        short_hash(&submission.commit_hash)
    )
}

/// PR description embedding the correlation id, event time and manifest.
#[must_use]
pub fn pull_request_body(submission: &ManifestSubmission, manifest_text: &str) -> String {
    format!(
        "Automated Pull Request from webhook event.\n\n\
         Associated Commit Hash (from payload): `{}`\n\
         Event Created At (from payload): `{}`\n\n\
         Manifest details included in this PR:\n\
         ```json\n{manifest_text}\n```",
        submission.commit_hash, submission.created_at
    )
}
