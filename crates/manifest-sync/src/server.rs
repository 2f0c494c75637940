//! HTTP server for manifest webhooks.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::RepositoryCoordinates;
use crate::error::PipelineError;
use crate::github_client::RepositoryClient;
use crate::models::{ManifestSubmission, OrchestrationResult, PullRequestStatus};
use crate::orchestrator::{PublishMode, Publisher};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<Publisher>,
}

impl AppState {
    #[must_use]
    pub fn new(client: Arc<dyn RepositoryClient>, repository: Arc<RepositoryCoordinates>) -> Self {
        Self {
            publisher: Arc::new(Publisher::new(client, repository)),
        }
    }
}

/// Build the HTTP router for the manifest service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/github-commit", post(direct_commit_handler))
        .route("/webhook/github-pr", post(pull_request_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Failure response: `{"detail": ...}` with the classified status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    /// Map a pipeline failure. Internal errors get `fallback` instead of detail.
    fn from_pipeline(err: PipelineError, fallback: &str) -> Self {
        match err {
            PipelineError::Remote { source, .. } => Self {
                status: StatusCode::from_u16(source.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                detail: source.message,
            },
            PipelineError::Internal(reason) => {
                error!(reason = %reason, "Internal error while publishing manifest");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: fallback.to_string(),
                }
            }
        }
    }
}

/// Unreadable or ill-typed request bodies are validation failures.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => rejection.status(),
        };
        warn!(status = %status, reason = %rejection.body_text(), "Rejected webhook body");
        Self {
            status,
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Commit the manifest straight to the base branch.
async fn direct_commit_handler(
    State(state): State<AppState>,
    payload: Result<Json<ManifestSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(submission) = payload?;
    info!(commit_hash = %submission.commit_hash, "Received direct commit webhook");

    let result = state
        .publisher
        .publish(PublishMode::DirectCommit, &submission)
        .await
        .map_err(|e| {
            ApiError::from_pipeline(e, "An internal server error occurred during direct commit.")
        })?;
    Ok((StatusCode::CREATED, Json(created_body(result))))
}

/// Commit the manifest to a new branch and open a pull request.
async fn pull_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<ManifestSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(submission) = payload?;
    info!(commit_hash = %submission.commit_hash, "Received pull request webhook");

    let result = state
        .publisher
        .publish(PublishMode::PullRequest, &submission)
        .await
        .map_err(|e| {
            ApiError::from_pipeline(e, "An internal server error occurred during PR creation.")
        })?;
    Ok((StatusCode::CREATED, Json(created_body(result))))
}

/// Success body for either flow.
fn created_body(result: OrchestrationResult) -> Value {
    match result {
        OrchestrationResult::DirectCommit(result) => json!({
            "message": "Webhook received and manifest committed directly to GitHub successfully.",
            "github_commit_details": result.commit_info,
            "github_content_details": result.content_info,
        }),
        OrchestrationResult::PullRequest(result) => {
            let message = match result.status {
                PullRequestStatus::Created => "Pull Request created successfully.".to_string(),
                PullRequestStatus::AlreadyExists => result
                    .pull_request_details
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Pull Request already exists.")
                    .to_string(),
            };
            json!({
                "message": message,
                "pull_request_url": result.pull_request_url,
                "pull_request_details": result.pull_request_details,
                "new_branch_name": result.new_branch_name,
                "commit_on_branch_details": result.commit_info,
            })
        }
    }
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Webhook to GitHub Commit Service is running."
    }))
}
