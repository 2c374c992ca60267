//! Pipeline executor: poll mode and build mode.
//!
//! Poll mode drains the event backlog, triggering one Jenkins job per pull
//! request event. Build mode branches the OBS package, waits for the build
//! and reports the result on the pull request.

use std::time::Duration;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::models::event::Event;
use crate::models::status::{CommitState, StatusUpdate};
use crate::services::event_queue::EventQueue;
use crate::services::obs_service;
use crate::services::poller::{BuildPoller, PollOutcome, PollReport, PollerConfig};
use crate::services::remote::{BuildService, EventFeed, JobTrigger, StatusApi};
use crate::services::service_file::SourceLocation;

const PICKED_UP_DESCRIPTION: &str = "Picked up by jenkins";
const BUILDING_DESCRIPTION: &str = "Building";
const RESULT_DESCRIPTION: &str = "Result";
const ERROR_DESCRIPTION: &str = "Build errored";

/// Settings shared by both pipelines, taken from [`BridgeConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub status_context: String,
    pub package: String,
    pub event_interval: Duration,
    pub skip_reported: bool,
    pub obs_web_url: String,
    pub poller: PollerConfig,
}

impl From<&BridgeConfig> for PipelineSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            status_context: config.status_context.clone(),
            package: config.package.clone(),
            event_interval: config.event_interval,
            skip_reported: config.skip_reported,
            obs_web_url: config.obs_web_url.clone(),
            poller: PollerConfig::from(config),
        }
    }
}

// ── Poll mode ──

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Jobs started, by event id.
    pub triggered: Vec<String>,
    /// Events dropped without starting a job, by event id.
    pub skipped: Vec<String>,
}

/// Drain the backlog, one job per event. Returns once the backlog is empty.
///
/// Every iteration refreshes the feed before popping, so events arriving
/// while the backlog drains are picked up in the same run. Any error aborts
/// the run; the event being processed is already off the backlog.
pub async fn run_poll<F, S, C>(
    queue: &mut EventQueue<F>,
    status: &S,
    ci: &C,
    job: &str,
    settings: &PipelineSettings,
) -> Result<PollSummary>
where
    F: EventFeed,
    S: StatusApi + ?Sized,
    C: JobTrigger + ?Sized,
{
    let mut summary = PollSummary::default();

    loop {
        queue.fetch_events().await?;
        let Some(event) = queue.pop_event()? else {
            break;
        };

        tracing::info!(event_id = %event.id, "Processing event");
        if process_event(&event, status, ci, job, settings).await? {
            summary.triggered.push(event.id);
        } else {
            summary.skipped.push(event.id);
        }

        tokio::time::sleep(settings.event_interval).await;
    }

    tracing::info!(
        triggered = summary.triggered.len(),
        skipped = summary.skipped.len(),
        "Event backlog drained"
    );
    Ok(summary)
}

/// Report "pending" on the pull request and start the CI job. Returns
/// whether a job was started.
async fn process_event<S, C>(
    event: &Event,
    status: &S,
    ci: &C,
    job: &str,
    settings: &PipelineSettings,
) -> Result<bool>
where
    S: StatusApi + ?Sized,
    C: JobTrigger + ?Sized,
{
    let Some(pr) = event.pull_request() else {
        tracing::warn!(event_id = %event.id, kind = %event.kind, "Event carries no pull request, skipping");
        return Ok(false);
    };

    let Some(statuses_href) = pr.statuses_href() else {
        tracing::warn!(event_id = %event.id, pr = %pr.url, "Pull request has no statuses link, skipping");
        return Ok(false);
    };

    if settings.skip_reported {
        let existing = status.get_statuses(statuses_href).await?;
        if existing
            .iter()
            .any(|s| s.context == settings.status_context)
        {
            tracing::info!(event_id = %event.id, pr = %pr.url, "Already picked up, skipping");
            return Ok(false);
        }
    }

    let pending = StatusUpdate::new(
        CommitState::Pending,
        PICKED_UP_DESCRIPTION,
        settings.status_context.as_str(),
    );
    let ack = status.set_status(statuses_href, &pending).await?;
    let status_url = ack.location.as_deref().unwrap_or(statuses_href);

    ci.trigger_job(job, &pr, Some(status_url)).await?;
    Ok(true)
}

// ── Build mode ──

/// Arguments of one build-mode run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub project: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub status_url: String,
    /// Link shown next to the status, usually the Jenkins build URL. When
    /// empty, the final status links the branched project's web page.
    pub build_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub branched_project: String,
    pub report: PollReport,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        self.report.outcome.is_success()
    }
}

/// Run build mode once: pending → branch/configure → poll → final status.
///
/// On a fatal error after "pending" went out, an "error" status is posted
/// on a best-effort basis before the error is returned.
pub async fn run_build<B, S>(
    obs: &B,
    obs_user: &str,
    status: &S,
    request: &BuildRequest,
    settings: &PipelineSettings,
) -> Result<BuildOutcome>
where
    B: BuildService + ?Sized,
    S: StatusApi + ?Sized,
{
    let label = request.build_label.as_str();
    let pending = StatusUpdate::new(
        CommitState::Pending,
        BUILDING_DESCRIPTION,
        settings.status_context.as_str(),
    )
    .with_target_url(label);
    status.set_status(&request.status_url, &pending).await?;

    let outcome = match build_and_wait(obs, obs_user, request, settings).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(project = %request.project, "Build run aborted: {e}");
            let errored = StatusUpdate::new(
                CommitState::Error,
                ERROR_DESCRIPTION,
                settings.status_context.as_str(),
            )
            .with_target_url(label);
            if let Err(report_err) = status.set_status(&request.status_url, &errored).await {
                tracing::warn!("Could not report build error status: {report_err}");
            }
            return Err(e);
        }
    };

    let final_state = if outcome.is_success() {
        CommitState::Success
    } else {
        CommitState::Failure
    };
    let target = if label.is_empty() {
        project_web_url(&settings.obs_web_url, &outcome.branched_project)
    } else {
        label.to_string()
    };
    let result = StatusUpdate::new(
        final_state,
        RESULT_DESCRIPTION,
        settings.status_context.as_str(),
    )
    .with_target_url(target);
    status.set_status(&request.status_url, &result).await?;

    crate::metrics::build_finished(outcome.report.outcome.as_str(), outcome.report.ticks);
    tracing::info!(
        branched = %outcome.branched_project,
        outcome = outcome.report.outcome.as_str(),
        ticks = outcome.report.ticks,
        remediations = outcome.report.remediations,
        "Build finished"
    );

    Ok(outcome)
}

async fn build_and_wait<B>(
    obs: &B,
    obs_user: &str,
    request: &BuildRequest,
    settings: &PipelineSettings,
) -> Result<BuildOutcome>
where
    B: BuildService + ?Sized,
{
    let source = SourceLocation {
        owner: &request.owner,
        repo: &request.repo,
        branch: &request.branch,
    };
    let branched = obs_service::branch_and_configure(
        obs,
        obs_user,
        &request.project,
        &settings.package,
        &source,
    )
    .await?;
    tracing::info!(url = %project_web_url(&settings.obs_web_url, &branched), "Branched project");

    let report = BuildPoller::new(obs, &settings.package, settings.poller)
        .wait_for_completion(&branched)
        .await?;

    if report.outcome == PollOutcome::Exhausted {
        tracing::warn!(branched = %branched, "Build service stayed broken after all re-runs");
    }

    Ok(BuildOutcome {
        branched_project: branched,
        report,
    })
}

/// Page of `project` on the build service web UI.
pub fn project_web_url(web_url: &str, project: &str) -> String {
    format!("{}/project/show/{project}", web_url.trim_end_matches('/'))
}
