//! Seams between the pipelines and the remote services they drive.
//!
//! The HTTP clients in this module's siblings implement these traits; the
//! pipelines and the poller only ever see the traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::build_result::BuildResultAggregate;
use crate::models::event::{Event, PullRequest};
use crate::models::status::{CommitStatus, StatusAck, StatusUpdate};

/// Outcome of a conditional events fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedResponse {
    /// The validator still matches; nothing was sent.
    NotModified,
    /// A fresh page of events and its validator.
    Fresh {
        token: Option<String>,
        events: Vec<Event>,
    },
}

/// Repository events feed with conditional GET support.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn fetch(&self, owner: &str, repo: &str, token: Option<&str>) -> Result<FeedResponse>;
}

/// Commit status API of the source-control host.
#[async_trait]
pub trait StatusApi: Send + Sync {
    async fn get_statuses(&self, url: &str) -> Result<Vec<CommitStatus>>;
    async fn set_status(&self, url: &str, update: &StatusUpdate) -> Result<StatusAck>;
}

/// CI system able to start a parameterised job for a pull request.
#[async_trait]
pub trait JobTrigger: Send + Sync {
    async fn trigger_job(
        &self,
        job: &str,
        pull_request: &PullRequest,
        status_url: Option<&str>,
    ) -> Result<()>;
}

/// Package build service.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Branch `package` of `project` into `target_project`.
    async fn branch_package(&self, project: &str, package: &str, target_project: &str)
        -> Result<()>;

    /// Upload the `_service` file of a package.
    async fn upload_service(&self, project: &str, package: &str, document: &str) -> Result<()>;

    /// Current build results of a project.
    async fn fetch_result(&self, project: &str) -> Result<BuildResultAggregate>;

    /// Ask the service to re-run source services (and thus rebuild).
    async fn rerun_service(&self, project: &str, package: &str) -> Result<()>;
}
