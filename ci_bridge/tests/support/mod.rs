//! In-process stand-in for GitHub, Jenkins and OBS.
//!
//! One axum server on `127.0.0.1:0` answers every route the bridge uses and
//! records each request it receives.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::sync::oneshot;

use ci_bridge::config::BridgeConfig;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
struct Script {
    events: serde_json::Value,
    etag_version: u32,
    statuses: serde_json::Value,
    /// Build results served oldest first; the last one repeats.
    results: Vec<String>,
    fail_job_start: bool,
    /// Feed page published when the next job starts.
    events_after_job: Option<serde_json::Value>,
}

#[derive(Clone, Default)]
struct MockState {
    base_url: Arc<String>,
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockRemote {
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: tokio::task::JoinHandle<()>,
}

impl MockRemote {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("mock listener addr");

        let state = MockState {
            base_url: Arc::new(format!("http://{addr}")),
            ..MockState::default()
        };
        {
            let mut script = state.script.lock().unwrap();
            script.events = serde_json::json!([]);
            script.statuses = serde_json::json!([]);
        }

        let app = Router::new().fallback(handle).with_state(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Self {
            state,
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.state.base_url
    }

    /// Bridge configuration pointing every remote at this server, with all
    /// sleeps disabled.
    pub fn config(&self, cache_dir: &std::path::Path) -> BridgeConfig {
        BridgeConfig {
            github_api_url: self.base_url().to_string(),
            obs_api_url: self.base_url().to_string(),
            obs_web_url: format!("{}/web", self.base_url()),
            jenkins_url: self.base_url().to_string(),
            cache_dir: cache_dir.to_path_buf(),
            poll_backoff: Duration::ZERO,
            event_interval: Duration::ZERO,
            max_ticks: Some(20),
            http_timeout: Some(Duration::from_secs(10)),
            ..BridgeConfig::default()
        }
    }

    /// Replace the events feed; the ETag changes with it.
    pub fn set_events(&self, events: serde_json::Value) {
        let mut script = self.state.script.lock().unwrap();
        script.events = events;
        script.etag_version += 1;
    }

    /// Publish `events` as a new feed page once the next job is started.
    pub fn set_events_after_job(&self, events: serde_json::Value) {
        self.state.script.lock().unwrap().events_after_job = Some(events);
    }

    pub fn set_statuses(&self, statuses: serde_json::Value) {
        self.state.script.lock().unwrap().statuses = statuses;
    }

    pub fn set_results(&self, results: Vec<String>) {
        self.state.script.lock().unwrap().results = results;
    }

    pub fn fail_job_start(&self) {
        self.state.script.lock().unwrap().fail_job_start = true;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path_prefix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .collect()
    }

    /// Pull request event whose statuses link points back at this server.
    pub fn pr_event(&self, id: u64, state: &str, base: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id.to_string(),
            "type": "PullRequestEvent",
            "payload": {
                "action": "opened",
                "pull_request": {
                    "url": format!("{}/repos/o/r/pulls/{id}", self.base_url()),
                    "number": id,
                    "state": state,
                    "base": {"ref": base, "sha": "base"},
                    "head": {"ref": format!("feature-{id}"), "sha": format!("sha{id}")},
                    "_links": {"statuses": {"href": format!("{}/repos/o/r/statuses/sha{id}", self.base_url())}}
                }
            }
        })
    }
}

impl Drop for MockRemote {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// `resultlist` with one x86_64 result whose salt package has `code`.
pub fn result_xml(dirty: bool, code: &str) -> String {
    format!(
        r#"<resultlist state="0123456789abcdef">
  <result project="home:bot:x" repository="openSUSE_Tumbleweed" arch="x86_64" code="published" state="published"{}>
    <status package="salt" code="{code}"/>
  </result>
</resultlist>"#,
        if dirty { r#" dirty="true""# } else { "" }
    )
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers: headers.clone(),
        body,
    });

    let mut script = state.script.lock().unwrap();
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        // GitHub
        (Method::GET, ["repos", _, _, "events"]) => {
            let etag = format!("\"v{}\"", script.etag_version);
            let sent = headers
                .get(header::IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok());
            if sent == Some(etag.as_str()) {
                return StatusCode::NOT_MODIFIED.into_response();
            }
            (
                StatusCode::OK,
                [(header::ETAG, etag)],
                axum::Json(script.events.clone()),
            )
                .into_response()
        }
        (Method::GET, ["repos", _, _, "statuses", _]) => {
            axum::Json(script.statuses.clone()).into_response()
        }
        (Method::POST, ["repos", _, _, "statuses", sha]) => {
            let location = format!("{}/repos/o/r/statuses/{sha}/1", state.base_url);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                axum::Json(serde_json::json!({"id": 1})),
            )
                .into_response()
        }

        // Jenkins
        (Method::GET, ["crumbIssuer", "api", "json"]) => axum::Json(serde_json::json!({
            "crumb": "c0ffee",
            "crumbRequestField": "Jenkins-Crumb"
        }))
        .into_response(),
        (Method::POST, ["job", _, "buildWithParameters"]) => {
            if script.fail_job_start {
                return (StatusCode::FORBIDDEN, "No valid crumb was included").into_response();
            }
            if headers.get("Jenkins-Crumb").is_none() {
                return StatusCode::FORBIDDEN.into_response();
            }
            if let Some(events) = script.events_after_job.take() {
                script.events = events;
                script.etag_version += 1;
            }
            let location = format!("{}/queue/item/7/", state.base_url);
            (StatusCode::CREATED, [(header::LOCATION, location)]).into_response()
        }

        // OBS
        (Method::POST, ["source", _, _]) => xml_ok(),
        (Method::PUT, ["source", _, _, "_service"]) => xml_ok(),
        (Method::GET, ["build", _, "_result"]) => {
            let xml = if script.results.len() > 1 {
                script.results.remove(0)
            } else {
                script.results.first().cloned().unwrap_or_default()
            };
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/xml")],
                xml,
            )
                .into_response()
        }
        (Method::POST, ["trigger", "runservice"]) => xml_ok(),

        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn xml_ok() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        r#"<status code="ok"><summary>Ok</summary></status>"#,
    )
        .into_response()
}
