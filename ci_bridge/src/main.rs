//! obs-ci-bridge: GitHub pull requests to Jenkins to Open Build Service.
//!
//! `poll` drains the repository's event backlog and starts one Jenkins job
//! per pull request. `build` runs inside that job: it branches the package
//! on OBS, waits for the build and reports the result on the pull request.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use ci_bridge::config::BridgeConfig;
use ci_bridge::credentials::{CredentialStore, Service};
use ci_bridge::services::event_cache::EventCacheStore;
use ci_bridge::services::event_queue::EventQueue;
use ci_bridge::services::executor::{self, BuildRequest, PipelineSettings};
use ci_bridge::services::github_service::GitHubClient;
use ci_bridge::services::jenkins_service::JenkinsClient;
use ci_bridge::services::obs_service::ObsClient;

#[derive(Parser)]
#[command(name = "obs-ci-bridge", about = "GitHub / Jenkins / OBS CI bridge")]
struct Cli {
    /// Directory holding the per-repository event backlog
    #[arg(long, global = true, env = "CI_BRIDGE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drain new pull request events and start a CI job for each
    Poll {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        /// Base branch whose pull requests are picked up
        #[arg(long)]
        branch: String,
        /// Jenkins job to start
        #[arg(long)]
        job: String,
    },
    /// Build a pull request branch on OBS and report the result
    Build {
        /// OBS project to branch from
        #[arg(long)]
        project: String,
        /// Owner of the pull request's head repository
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        /// Head branch of the pull request
        #[arg(long, alias = "gitbranch")]
        branch: String,
        /// Commit statuses URL to report on
        #[arg(long, alias = "statusurl")]
        status_url: String,
        /// Link attached to the reported statuses
        #[arg(long, alias = "build")]
        build_label: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run succeeded.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = BridgeConfig::from_env();
    if let Some(cache_dir) = cli.cache_dir {
        config.cache_dir = cache_dir;
    }
    ci_bridge::metrics::init_metrics(config.metrics_addr);

    let credentials = CredentialStore::from_env();
    let settings = PipelineSettings::from(&config);
    let github = GitHubClient::new(&config, credentials.resolve(Service::SourceControl))
        .context("building GitHub client")?;

    match cli.command {
        Command::Poll {
            owner,
            repo,
            branch,
            job,
        } => {
            let jenkins = JenkinsClient::new(&config, credentials.resolve(Service::CiSystem))
                .context("building Jenkins client")?;
            let store = EventCacheStore::new(&config.cache_dir, &owner, &repo);
            let mut queue = EventQueue::new(github.clone(), store, &owner, &repo, &branch);

            tracing::info!(%owner, %repo, %branch, %job, "Polling for pull request events");
            let summary = executor::run_poll(&mut queue, &github, &jenkins, &job, &settings)
                .await
                .with_context(|| format!("polling {owner}/{repo}"))?;
            tracing::info!(triggered = summary.triggered.len(), "Poll finished");
            Ok(true)
        }
        Command::Build {
            project,
            owner,
            repo,
            branch,
            status_url,
            build_label,
        } => {
            let obs = ObsClient::new(
                &config,
                credentials.resolve(Service::BuildService),
                credentials.obs_trigger_token(),
            )
            .context("building OBS client")?;
            let request = BuildRequest {
                project,
                owner,
                repo,
                branch,
                status_url,
                build_label,
            };

            tracing::info!(project = %request.project, branch = %request.branch, "Starting build");
            let outcome = executor::run_build(&obs, obs.user(), &github, &request, &settings)
                .await
                .with_context(|| format!("building {}", request.project))?;
            Ok(outcome.is_success())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_ARGS: [&str; 12] = [
        "obs-ci-bridge",
        "build",
        "--project",
        "devel:salt",
        "--owner",
        "o",
        "--repo",
        "salt",
        "--gitbranch",
        "fix",
        "--statusurl",
        "https://api.github.com/repos/o/salt/statuses/abc",
    ];

    #[test]
    fn build_label_is_required() {
        let err = Cli::try_parse_from(BUILD_ARGS).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn build_accepts_the_legacy_flag_names() {
        let args = BUILD_ARGS.iter().copied().chain(["--build", "https://ci/job/1"]);
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Build {
                branch,
                status_url,
                build_label,
                ..
            } => {
                assert_eq!(branch, "fix");
                assert_eq!(status_url, "https://api.github.com/repos/o/salt/statuses/abc");
                assert_eq!(build_label, "https://ci/job/1");
            }
            Command::Poll { .. } => panic!("parsed as poll"),
        }
    }
}
