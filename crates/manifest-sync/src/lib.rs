//! Webhook service that publishes JSON manifests to a GitHub repository.
//!
//! This crate provides:
//! - A direct commit flow that writes the manifest to the base branch
//! - A pull request flow that writes to a new branch and opens a PR
//! - A GitHub REST client with conditional writes and idempotent create calls
//! - Classification of GitHub failures into a small error taxonomy
//! - An axum HTTP server exposing both flows as webhooks

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Every flow step is a fallible remote call

pub mod branch;
pub mod config;
pub mod error;
pub mod github_client;
pub mod models;
pub mod orchestrator;
pub mod server;

pub use config::{Config, ConfigError, RepositoryCoordinates};
pub use error::{PipelineError, RemoteError, RemoteErrorKind, Stage};
pub use github_client::{GitHubClient, RepositoryClient};
pub use models::*;
pub use orchestrator::{DirectCommitOrchestrator, PublishMode, Publisher, PullRequestOrchestrator};
