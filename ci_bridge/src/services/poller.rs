//! Build completion poller.
//!
//! Polls a branched project's build results until they converge:
//!
//! ```text
//!               ┌──────────── Transient / Converging / BrokenRetry ───────────┐
//!               v                                                              │
//!          Querying ── fetch _result ──> classify ─────────────────────────────┘
//!                                            │
//!                                            └──> Failed | Succeeded | Exhausted
//! ```
//!
//! Dirty or unknown results are waited out. `broken` results trigger a
//! runservice re-run while the retry budget lasts; `failed` results are
//! final and never retried.

use std::fmt;
use std::time::Duration;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::models::build_result::{BuildResultAggregate, CODE_BROKEN, CODE_FAILED};
use crate::services::remote::BuildService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// About to fetch results.
    Querying,
    /// Some repository is dirty or in an unknown state.
    Transient,
    /// Broken result; a re-run was requested and `remaining` re-runs are left.
    BrokenRetry { remaining: u32 },
    /// Settled repositories, but statuses are neither final nor uniform.
    Converging,
    Failed,
    Succeeded,
    /// Broken results outlasted the retry budget.
    Exhausted,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Failed | PollState::Succeeded | PollState::Exhausted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Querying => "querying",
            PollState::Transient => "transient",
            PollState::BrokenRetry { .. } => "broken_retry",
            PollState::Converging => "converging",
            PollState::Failed => "failed",
            PollState::Succeeded => "succeeded",
            PollState::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::BrokenRetry { remaining } => write!(f, "broken_retry(budget:{remaining})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Classify one aggregate given the retry budget left before this tick.
///
/// The order of checks matters: an empty budget wins over `failed` and
/// `succeeded`, and `broken` wins over everything while budget remains.
pub fn classify(aggregate: &BuildResultAggregate, budget: u32) -> PollState {
    if aggregate.is_unready() {
        return PollState::Transient;
    }
    let codes = aggregate.distinct_codes();
    if codes.contains(CODE_BROKEN) && budget > 0 {
        PollState::BrokenRetry {
            remaining: budget - 1,
        }
    } else if budget == 0 {
        PollState::Exhausted
    } else if codes.contains(CODE_FAILED) {
        PollState::Failed
    } else if aggregate.all_succeeded() {
        PollState::Succeeded
    } else {
        PollState::Converging
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded,
    Failed,
    Exhausted,
    /// `max_ticks` polls went by without a terminal state.
    TickLimit,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollOutcome::Succeeded => "succeeded",
            PollOutcome::Failed => "failed",
            PollOutcome::Exhausted => "exhausted",
            PollOutcome::TickLimit => "tick_limit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    /// State reached on each tick, in order.
    pub transitions: Vec<PollState>,
    /// Re-run requests issued.
    pub remediations: u32,
    pub ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub backoff: Duration,
    pub retry_budget: u32,
    /// `None` polls until a terminal state, however long that takes.
    pub max_ticks: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(120),
            retry_budget: 3,
            max_ticks: None,
        }
    }
}

impl From<&BridgeConfig> for PollerConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            backoff: config.poll_backoff,
            retry_budget: config.retry_budget,
            max_ticks: config.max_ticks,
        }
    }
}

pub struct BuildPoller<'a, B: ?Sized> {
    service: &'a B,
    package: &'a str,
    config: PollerConfig,
}

impl<'a, B: BuildService + ?Sized> BuildPoller<'a, B> {
    pub fn new(service: &'a B, package: &'a str, config: PollerConfig) -> Self {
        Self {
            service,
            package,
            config,
        }
    }

    /// Poll `project` until its build converges.
    ///
    /// Transient fetch errors count as a `Transient` tick; permanent ones and
    /// failed re-run requests are returned.
    pub async fn wait_for_completion(&self, project: &str) -> Result<PollReport> {
        let mut budget = self.config.retry_budget;
        let mut transitions = Vec::new();
        let mut remediations = 0;
        let mut ticks = 0;

        tracing::info!(
            project,
            budget,
            max_ticks = ?self.config.max_ticks,
            backoff_secs = self.config.backoff.as_secs(),
            "Waiting for build results"
        );

        loop {
            if self.config.max_ticks.is_some_and(|max| ticks >= max) {
                tracing::warn!(project, ticks, "Giving up on build results: tick limit reached");
                return Ok(PollReport {
                    outcome: PollOutcome::TickLimit,
                    transitions,
                    remediations,
                    ticks,
                });
            }
            ticks += 1;

            let state = match self.service.fetch_result(project).await {
                Ok(aggregate) => classify(&aggregate, budget),
                Err(e) if e.is_transient() => {
                    tracing::warn!(project, "Build result fetch failed, will retry: {e}");
                    PollState::Transient
                }
                Err(e) => return Err(e),
            };
            transitions.push(state);
            crate::metrics::poll_tick(state.as_str());
            tracing::info!(project, tick = ticks, state = %state, "Build poll");

            let outcome = match state {
                PollState::BrokenRetry { remaining } => {
                    self.service.rerun_service(project, self.package).await?;
                    crate::metrics::remediation_requested();
                    remediations += 1;
                    budget = remaining;
                    tracing::warn!(project, remaining, "Broken build, re-run requested");
                    None
                }
                PollState::Failed => Some(PollOutcome::Failed),
                PollState::Succeeded => Some(PollOutcome::Succeeded),
                PollState::Exhausted => Some(PollOutcome::Exhausted),
                PollState::Querying | PollState::Transient | PollState::Converging => None,
            };

            if let Some(outcome) = outcome {
                return Ok(PollReport {
                    outcome,
                    transitions,
                    remediations,
                    ticks,
                });
            }

            tokio::time::sleep(self.config.backoff).await;
        }
    }
}
