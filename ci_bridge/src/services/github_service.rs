//! GitHub integration: repository events feed and commit statuses.

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH, LOCATION};
use reqwest::StatusCode;

use crate::config::BridgeConfig;
use crate::credentials::Credentials;
use crate::error::{ensure_success, BridgeError, Remote, Result};
use crate::models::event::Event;
use crate::models::status::{CommitStatus, StatusAck, StatusUpdate};
use crate::services::remote::{EventFeed, FeedResponse, StatusApi};

const ACCEPT: &str = "application/vnd.github+json";

#[derive(Clone, Debug)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    per_page: u32,
    credentials: Credentials,
}

impl GitHubClient {
    pub fn new(config: &BridgeConfig, credentials: Credentials) -> Result<Self> {
        let client = config
            .http_client_builder()
            .build()
            .map_err(|e| BridgeError::transport(Remote::GitHub, e))?;
        Ok(Self {
            client,
            api_url: config.github_api_url.clone(),
            per_page: config.events_per_page,
            credentials,
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .request(method, url)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", "2022-11-28");
        self.credentials.apply(req)
    }
}

#[async_trait]
impl EventFeed for GitHubClient {
    async fn fetch(&self, owner: &str, repo: &str, token: Option<&str>) -> Result<FeedResponse> {
        let url = format!("{}/repos/{owner}/{repo}/events", self.api_url);
        let mut req = self
            .request(reqwest::Method::GET, &url)
            .query(&[("per_page", self.per_page)]);
        if let Some(token) = token {
            req = req.header(IF_NONE_MATCH, token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| BridgeError::transport(Remote::GitHub, e))?;

        if resp.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!(owner, repo, "events feed not modified");
            return Ok(FeedResponse::NotModified);
        }

        let resp = ensure_success(Remote::GitHub, resp).await?;
        let token = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(|e| BridgeError::transport(Remote::GitHub, e))?;
        let events: Vec<Event> =
            serde_json::from_slice(&body).map_err(|e| BridgeError::json(Remote::GitHub, e))?;

        tracing::debug!(owner, repo, count = events.len(), "fetched events page");
        Ok(FeedResponse::Fresh { token, events })
    }
}

#[async_trait]
impl StatusApi for GitHubClient {
    async fn get_statuses(&self, url: &str) -> Result<Vec<CommitStatus>> {
        let resp = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| BridgeError::transport(Remote::GitHub, e))?;
        let resp = ensure_success(Remote::GitHub, resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| BridgeError::transport(Remote::GitHub, e))?;
        serde_json::from_slice(&body).map_err(|e| BridgeError::json(Remote::GitHub, e))
    }

    async fn set_status(&self, url: &str, update: &StatusUpdate) -> Result<StatusAck> {
        let resp = self
            .request(reqwest::Method::POST, url)
            .json(update)
            .send()
            .await
            .map_err(|e| BridgeError::transport(Remote::GitHub, e))?;
        let resp = ensure_success(Remote::GitHub, resp).await?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        crate::metrics::status_posted(update.state.as_str());
        tracing::info!(
            state = %update.state,
            context = %update.context,
            url,
            "Commit status posted"
        );

        Ok(StatusAck { location })
    }
}
