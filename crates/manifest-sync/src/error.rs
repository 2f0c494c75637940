//! Error taxonomy for GitHub API calls and the classifier that produces it.
//!
//! Both orchestrators only ever see [`RemoteError`]; raw transport details
//! stop at [`classify`]. The two "already exists" matchers are the only code
//! that looks at GitHub's error text.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The resource is absent (HTTP 404).
    NotFound,
    /// Stale blob SHA or a ref race (HTTP 409).
    Conflict,
    /// GitHub rejected the request payload (HTTP 422).
    Validation,
    /// The request never reached GitHub.
    TransientNetwork,
    /// Any other status, or a response body of the wrong shape.
    Unexpected,
}

impl RemoteErrorKind {
    /// Status reported inbound when the upstream call carried none.
    #[must_use]
    pub fn default_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Validation => 422,
            Self::TransientNetwork => 503,
            Self::Unexpected => 500,
        }
    }
}

/// A classified failure from the GitHub API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// Upstream HTTP status, if the server answered.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    #[must_use]
    pub fn new(kind: RemoteErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    /// HTTP status to report to the inbound caller.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.kind {
            RemoteErrorKind::TransientNetwork => 503,
            _ => self.status.unwrap_or_else(|| self.kind.default_status()),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

/// What came back from a single remote call, before classification.
#[derive(Debug, Clone)]
pub enum TransportOutcome {
    /// DNS, connect, TLS or timeout failure.
    Unreachable(String),
    /// The server answered with a non-2xx status.
    Status { status: u16, body: String },
    /// A 2xx answer whose body does not have the expected shape.
    Malformed(String),
}

/// The remote operation a failure belongs to. Used to build messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    ReadFile { branch: &'a str },
    WriteFile { branch: &'a str },
    GetBranchHead { branch: &'a str },
    CreateBranch { branch: &'a str },
    CreatePullRequest { head: &'a str, base: &'a str },
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { branch } => write!(f, "GET file SHA on '{branch}'"),
            Self::WriteFile { branch } => write!(f, "PUT content on '{branch}'"),
            Self::GetBranchHead { branch } => write!(f, "getting base branch SHA for '{branch}'"),
            Self::CreateBranch { branch } => write!(f, "creating branch '{branch}'"),
            Self::CreatePullRequest { head, base } => {
                write!(f, "creating PR from '{head}' to '{base}'")
            }
        }
    }
}

/// Map a transport outcome to a [`RemoteError`].
///
/// 404/409/422 get their own kinds; every other status is `Unexpected` with
/// the upstream status kept verbatim.
#[must_use]
pub fn classify(outcome: TransportOutcome, op: Operation<'_>) -> RemoteError {
    match outcome {
        TransportOutcome::Unreachable(reason) => RemoteError::new(
            RemoteErrorKind::TransientNetwork,
            None,
            format!("Network error connecting to GitHub ({op}): {reason}"),
        ),
        TransportOutcome::Malformed(reason) => RemoteError::new(
            RemoteErrorKind::Unexpected,
            None,
            format!("Unexpected response structure from GitHub ({op}): {reason}"),
        ),
        TransportOutcome::Status { status, body } => {
            let (kind, message) = match status {
                404 => (
                    RemoteErrorKind::NotFound,
                    format!("GitHub API error ({op}): {status} - {body}"),
                ),
                409 => (
                    RemoteErrorKind::Conflict,
                    format!(
                        "GitHub API conflict ({op}): {body}. This might be due to an outdated SHA \
                         or branch protection rules."
                    ),
                ),
                422 => (RemoteErrorKind::Validation, validation_message(op, &body)),
                _ => (
                    RemoteErrorKind::Unexpected,
                    format!("GitHub API error ({op}): {status} - {body}"),
                ),
            };
            RemoteError::new(kind, Some(status), message)
        }
    }
}

fn validation_message(op: Operation<'_>, body: &str) -> String {
    match op {
        Operation::WriteFile { branch } => format!(
            "GitHub API Unprocessable Entity ({op}): {body}. Ensure the branch '{branch}' exists \
             and the payload is correctly formatted."
        ),
        _ => format!("GitHub API validation error ({op}): 422 - {body}"),
    }
}

/// True when a create-ref response says the branch is already there.
#[must_use]
pub fn is_reference_already_exists(status: u16, body: &str) -> bool {
    status == 422 && body.contains("Reference already exists")
}

/// True when a create-PR response says an open PR for the head already exists.
///
/// GitHub puts the text in `errors[].message`; the raw body is the fallback
/// when it is not JSON.
#[must_use]
pub fn is_pull_request_already_exists(status: u16, body: &str) -> bool {
    const NEEDLE: &str = "A pull request already exists";
    if status != 422 {
        return false;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| {
                errors.iter().any(|err| {
                    err.get("message")
                        .and_then(Value::as_str)
                        .is_some_and(|m| m.contains(NEEDLE))
                })
            }),
        Err(_) => body.contains(NEEDLE),
    }
}

/// Step of a pipeline run, carried by [`PipelineError`] so a partial run
/// shows where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadCurrentSha,
    WriteFile,
    ResolveBase,
    CreateBranch,
    CommitToBranch,
    OpenPullRequest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadCurrentSha => "read_current_sha",
            Self::WriteFile => "write_file",
            Self::ResolveBase => "resolve_base",
            Self::CreateBranch => "create_branch",
            Self::CommitToBranch => "commit_to_branch",
            Self::OpenPullRequest => "open_pull_request",
        };
        f.write_str(name)
    }
}

/// Why a submission's pipeline stopped.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A remote call failed with a classified error.
    #[error("{source}")]
    Remote {
        stage: Stage,
        #[source]
        source: RemoteError,
    },

    /// Anything that is not a remote failure. Reported without detail.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    #[must_use]
    pub fn remote(stage: Stage, source: RemoteError) -> Self {
        Self::Remote { stage, source }
    }

    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Remote { stage, .. } => Some(*stage),
            Self::Internal(_) => None,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("manifest serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, body: &str) -> TransportOutcome {
        TransportOutcome::Status {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_classify_status_codes() {
        let op = Operation::ReadFile { branch: "main" };
        assert_eq!(classify(status(404, "nope"), op).kind, RemoteErrorKind::NotFound);
        assert_eq!(classify(status(409, "stale"), op).kind, RemoteErrorKind::Conflict);
        assert_eq!(classify(status(422, "bad"), op).kind, RemoteErrorKind::Validation);
        assert_eq!(classify(status(401, "auth"), op).kind, RemoteErrorKind::Unexpected);
        assert_eq!(classify(status(502, "bad gw"), op).kind, RemoteErrorKind::Unexpected);
    }

    #[test]
    fn test_classify_keeps_upstream_status() {
        let err = classify(status(403, "forbidden"), Operation::ReadFile { branch: "main" });
        assert_eq!(err.status, Some(403));
        assert_eq!(err.status_code(), 403);
        assert!(err.message.contains("403 - forbidden"));
    }

    #[test]
    fn test_classify_unreachable_is_503() {
        let err = classify(
            TransportOutcome::Unreachable("connection refused".to_string()),
            Operation::CreateBranch { branch: "feature/x" },
        );
        assert_eq!(err.kind, RemoteErrorKind::TransientNetwork);
        assert_eq!(err.status, None);
        assert_eq!(err.status_code(), 503);
        assert!(err.message.contains("Network error"));
    }

    #[test]
    fn test_classify_malformed_is_500() {
        let err = classify(
            TransportOutcome::Malformed("missing field `object`".to_string()),
            Operation::GetBranchHead { branch: "main" },
        );
        assert_eq!(err.kind, RemoteErrorKind::Unexpected);
        assert_eq!(err.status_code(), 500);
        assert!(err.message.contains("'main'"));
    }

    #[test]
    fn test_conflict_message_mentions_stale_sha() {
        let err = classify(status(409, "sha mismatch"), Operation::WriteFile { branch: "main" });
        assert!(err.message.contains("outdated SHA"));
        assert!(err.message.contains("branch protection"));
    }

    #[test]
    fn test_write_validation_message_has_hint() {
        let err = classify(status(422, "{}"), Operation::WriteFile { branch: "develop" });
        assert!(err.message.contains("Ensure the branch 'develop' exists"));
    }

    #[test]
    fn test_base_branch_not_found_names_branch() {
        let err = classify(
            status(404, r#"{"message":"Not Found"}"#),
            Operation::GetBranchHead { branch: "release" },
        );
        assert_eq!(err.status_code(), 404);
        assert!(err.message.contains("'release'"));
    }

    #[test]
    fn test_reference_already_exists() {
        let body = r#"{"message":"Reference already exists","status":"422"}"#;
        assert!(is_reference_already_exists(422, body));
        assert!(!is_reference_already_exists(409, body));
        assert!(!is_reference_already_exists(422, r#"{"message":"Invalid sha"}"#));
    }

    #[test]
    fn test_pull_request_already_exists() {
        let body = r#"{"message":"Validation Failed","errors":[{"resource":"PullRequest","code":"custom","message":"A pull request already exists for acme:feature/x."}]}"#;
        assert!(is_pull_request_already_exists(422, body));
        assert!(!is_pull_request_already_exists(400, body));

        let other = r#"{"message":"Validation Failed","errors":[{"message":"No commits between main and feature/x"}]}"#;
        assert!(!is_pull_request_already_exists(422, other));
    }

    #[test]
    fn test_pull_request_already_exists_plain_text() {
        assert!(is_pull_request_already_exists(
            422,
            "A pull request already exists for acme:feature/x."
        ));
    }

    #[test]
    fn test_pipeline_error_stage() {
        let err = PipelineError::remote(
            Stage::OpenPullRequest,
            RemoteError::new(RemoteErrorKind::Validation, Some(422), "bad"),
        );
        assert_eq!(err.stage(), Some(Stage::OpenPullRequest));
        assert_eq!(err.to_string(), "bad");
        assert_eq!(PipelineError::Internal("x".into()).stage(), None);
    }
}
