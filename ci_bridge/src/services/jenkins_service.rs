//! Jenkins integration: crumb retrieval and parameterised job starts.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::BridgeConfig;
use crate::credentials::Credentials;
use crate::error::{ensure_success, BridgeError, Remote, Result};
use crate::models::event::PullRequest;
use crate::services::remote::JobTrigger;

const DEFAULT_CRUMB_FIELD: &str = "Jenkins-Crumb";

/// Anti-forgery token issued by `crumbIssuer`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crumb {
    pub crumb: String,
    #[serde(default = "default_crumb_field")]
    pub crumb_request_field: String,
}

fn default_crumb_field() -> String {
    DEFAULT_CRUMB_FIELD.to_string()
}

#[derive(Clone, Debug)]
pub struct JenkinsClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl JenkinsClient {
    pub fn new(config: &BridgeConfig, credentials: Credentials) -> Result<Self> {
        let client = config
            .http_client_builder()
            .danger_accept_invalid_certs(config.jenkins_insecure)
            .build()
            .map_err(|e| BridgeError::transport(Remote::Jenkins, e))?;
        Ok(Self {
            client,
            base_url: config.jenkins_url.clone(),
            credentials,
        })
    }

    /// Fetch a fresh crumb. Crumbs are single use.
    pub async fn crumb(&self) -> Result<Crumb> {
        let url = format!("{}/crumbIssuer/api/json", self.base_url);
        let resp = self
            .credentials
            .apply(self.client.get(&url))
            .send()
            .await
            .map_err(|e| BridgeError::transport(Remote::Jenkins, e))?;
        let resp = ensure_success(Remote::Jenkins, resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| BridgeError::transport(Remote::Jenkins, e))?;
        let crumb: Crumb =
            serde_json::from_slice(&body).map_err(|e| BridgeError::json(Remote::Jenkins, e))?;
        if crumb.crumb.is_empty() {
            return Err(BridgeError::MissingField {
                remote: Remote::Jenkins,
                what: "crumb",
            });
        }
        Ok(crumb)
    }
}

/// Form parameters handed to `buildWithParameters`.
pub fn job_parameters<'a>(
    pull_request: &'a PullRequest,
    status_url: Option<&'a str>,
) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("branch", pull_request.head.name.as_str())];
    if let Some(url) = status_url {
        params.push(("statusurl", url));
    }
    params
}

#[async_trait]
impl JobTrigger for JenkinsClient {
    async fn trigger_job(
        &self,
        job: &str,
        pull_request: &PullRequest,
        status_url: Option<&str>,
    ) -> Result<()> {
        tracing::info!(job, pr = %pull_request.url, "Triggering Jenkins job");

        let crumb = self.crumb().await?;
        let url = format!("{}/job/{job}/buildWithParameters", self.base_url);
        let resp = self
            .credentials
            .apply(self.client.post(&url))
            .header(crumb.crumb_request_field.as_str(), crumb.crumb.as_str())
            .form(&job_parameters(pull_request, status_url))
            .send()
            .await
            .map_err(|e| BridgeError::transport(Remote::Jenkins, e))?;
        let resp = ensure_success(Remote::Jenkins, resp).await?;

        let queue_item = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        crate::metrics::job_triggered(job);
        tracing::info!(job, branch = %pull_request.head.name, queue_item, "Jenkins job queued");
        Ok(())
    }
}
