//! Open Build Service integration: branching, `_service` upload, results.

use async_trait::async_trait;

use crate::config::BridgeConfig;
use crate::credentials::Credentials;
use crate::error::{ensure_success, BridgeError, Remote, Result};
use crate::models::build_result::BuildResultAggregate;
use crate::services::remote::BuildService;
use crate::services::service_file::{self, SourceLocation};

#[derive(Clone, Debug)]
pub struct ObsClient {
    client: reqwest::Client,
    api_url: String,
    credentials: Credentials,
    trigger_token: String,
}

impl ObsClient {
    pub fn new(
        config: &BridgeConfig,
        credentials: Credentials,
        trigger_token: impl Into<String>,
    ) -> Result<Self> {
        let client = config
            .http_client_builder()
            .build()
            .map_err(|e| BridgeError::transport(Remote::Obs, e))?;
        Ok(Self {
            client,
            api_url: config.obs_api_url.clone(),
            credentials,
            trigger_token: trigger_token.into(),
        })
    }

    pub fn user(&self) -> &str {
        &self.credentials.user
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| BridgeError::transport(Remote::Obs, e))?;
        ensure_success(Remote::Obs, resp).await
    }
}

#[async_trait]
impl BuildService for ObsClient {
    async fn branch_package(
        &self,
        project: &str,
        package: &str,
        target_project: &str,
    ) -> Result<()> {
        let url = format!("{}/source/{project}/{package}", self.api_url);
        let req = self
            .credentials
            .apply(self.client.post(&url))
            .query(&[("cmd", "branch")])
            .form(&[("target_project", target_project)]);
        self.send(req).await?;
        Ok(())
    }

    async fn upload_service(&self, project: &str, package: &str, document: &str) -> Result<()> {
        let url = format!("{}/source/{project}/{package}/_service", self.api_url);
        let req = self
            .credentials
            .apply(self.client.put(&url))
            .header("Content-Type", "application/xml")
            .body(document.to_string());
        self.send(req).await?;
        Ok(())
    }

    async fn fetch_result(&self, project: &str) -> Result<BuildResultAggregate> {
        let url = format!("{}/build/{project}/_result", self.api_url);
        let resp = self.send(self.credentials.apply(self.client.get(&url))).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| BridgeError::transport(Remote::Obs, e))?;
        Ok(BuildResultAggregate::from_xml(&body)?)
    }

    async fn rerun_service(&self, project: &str, package: &str) -> Result<()> {
        let url = format!("{}/trigger/runservice", self.api_url);
        let req = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.trigger_token))
            .form(&[("project", project), ("package", package)]);
        self.send(req).await?;
        Ok(())
    }
}

/// Name of a fresh branch of `project` under the bot's home project.
///
/// Keeps the last three `:`-separated segments of the source project so the
/// name stays readable, then appends a random 32-hex-digit suffix.
pub fn branched_project_name(user: &str, project: &str) -> String {
    let segments: Vec<&str> = project.split(':').collect();
    let tail = segments[segments.len().saturating_sub(3)..].join(":");
    let ident = uuid::Uuid::new_v4().simple();
    format!("home:{user}:{tail}-{ident}")
}

/// Branch `package` of `project` and point the branch's `_service` at the
/// pull request's head branch. Returns the branched project name.
pub async fn branch_and_configure<B: BuildService + ?Sized>(
    obs: &B,
    user: &str,
    project: &str,
    package: &str,
    source: &SourceLocation<'_>,
) -> Result<String> {
    let branched = branched_project_name(user, project);
    obs.branch_package(project, package, &branched).await?;
    tracing::info!(project, branched = %branched, "Branched build service project");

    let document = service_file::render(source);
    obs.upload_service(&branched, package, &document).await?;
    tracing::info!(
        branched = %branched,
        repo = %format!("{}/{}", source.owner, source.repo),
        branch = source.branch,
        "Uploaded _service"
    );

    Ok(branched)
}
