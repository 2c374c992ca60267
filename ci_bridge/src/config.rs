//! Bridge configuration: loaded once from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// GitHub REST API base URL.
    pub github_api_url: String,
    /// OBS API base URL.
    pub obs_api_url: String,
    /// OBS web UI base URL, used for human-facing project links.
    pub obs_web_url: String,
    /// Jenkins base URL.
    pub jenkins_url: String,
    /// Skip TLS verification towards Jenkins.
    pub jenkins_insecure: bool,
    /// Directory holding the per-repository event cache.
    pub cache_dir: PathBuf,
    /// Status context the bridge reports under.
    pub status_context: String,
    /// OBS package that gets branched and rebuilt.
    pub package: String,
    /// Sleep between build result polls.
    pub poll_backoff: Duration,
    /// Sleep between processed events in poll mode.
    pub event_interval: Duration,
    /// Number of runservice re-runs allowed for "broken" results.
    pub retry_budget: u32,
    /// Upper bound on result polls. `None` polls until the build converges.
    pub max_ticks: Option<u32>,
    /// Page size requested from the events feed.
    pub events_per_page: u32,
    /// Per-request timeout; `None` keeps the client default.
    pub http_timeout: Option<Duration>,
    /// Skip pull requests that already carry a status in our context.
    pub skip_reported: bool,
    /// Prometheus listener address; metrics are disabled when unset.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            github_api_url: "https://api.github.com".to_string(),
            obs_api_url: "https://api.opensuse.org".to_string(),
            obs_web_url: "https://build.opensuse.org".to_string(),
            jenkins_url: "https://ci.suse.de".to_string(),
            jenkins_insecure: false,
            cache_dir: PathBuf::from("cache"),
            status_context: "jenkins/salt-obs-build".to_string(),
            package: "salt".to_string(),
            poll_backoff: Duration::from_secs(120),
            event_interval: Duration::from_secs(5),
            retry_budget: 3,
            max_ticks: None,
            events_per_page: 100,
            http_timeout: None,
            skip_reported: false,
            metrics_addr: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str| {
            lookup(key)
                .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };
        let trim_url = |s: String| s.trim_end_matches('/').to_string();

        let config = Self {
            github_api_url: lookup("CI_BRIDGE_GITHUB_API")
                .map(trim_url)
                .unwrap_or(defaults.github_api_url),
            obs_api_url: lookup("CI_BRIDGE_OBS_API")
                .map(trim_url)
                .unwrap_or(defaults.obs_api_url),
            obs_web_url: lookup("CI_BRIDGE_OBS_WEB")
                .map(trim_url)
                .unwrap_or(defaults.obs_web_url),
            jenkins_url: lookup("CI_BRIDGE_JENKINS_URL")
                .map(trim_url)
                .unwrap_or(defaults.jenkins_url),
            jenkins_insecure: flag("CI_BRIDGE_JENKINS_INSECURE"),
            cache_dir: lookup("CI_BRIDGE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            status_context: lookup("CI_BRIDGE_STATUS_CONTEXT").unwrap_or(defaults.status_context),
            package: lookup("CI_BRIDGE_PACKAGE").unwrap_or(defaults.package),
            poll_backoff: parse_var(&lookup, "CI_BRIDGE_POLL_BACKOFF")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_backoff),
            event_interval: parse_var(&lookup, "CI_BRIDGE_EVENT_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.event_interval),
            retry_budget: parse_var(&lookup, "CI_BRIDGE_RETRY_BUDGET").unwrap_or(defaults.retry_budget),
            max_ticks: parse_var(&lookup, "CI_BRIDGE_MAX_TICKS").filter(|n: &u32| *n > 0),
            events_per_page: parse_var(&lookup, "CI_BRIDGE_EVENTS_PER_PAGE")
                .unwrap_or(defaults.events_per_page),
            http_timeout: parse_var(&lookup, "CI_BRIDGE_HTTP_TIMEOUT").map(Duration::from_secs),
            skip_reported: flag("CI_BRIDGE_SKIP_REPORTED"),
            metrics_addr: parse_var(&lookup, "CI_BRIDGE_METRICS_ADDR"),
        };

        if config.jenkins_insecure {
            tracing::warn!("CI_BRIDGE_JENKINS_INSECURE set -- Jenkins TLS certificates are not verified");
        }
        if config.max_ticks.is_none() {
            tracing::debug!("CI_BRIDGE_MAX_TICKS not set -- build polling is unbounded");
        }

        config
    }

    /// Shared HTTP client builder honouring the configured timeout.
    pub fn http_client_builder(&self) -> reqwest::ClientBuilder {
        let builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        match self.http_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> BridgeConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BridgeConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_match_the_documented_constants() {
        let config = config_from(&[]);
        assert_eq!(config.poll_backoff, Duration::from_secs(120));
        assert_eq!(config.event_interval, Duration::from_secs(5));
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.max_ticks, None);
        assert_eq!(config.status_context, "jenkins/salt-obs-build");
        assert!(!config.skip_reported);
    }

    #[test]
    fn overrides_are_parsed_and_urls_trimmed() {
        let config = config_from(&[
            ("CI_BRIDGE_OBS_API", "http://localhost:3000/"),
            ("CI_BRIDGE_POLL_BACKOFF", "7"),
            ("CI_BRIDGE_MAX_TICKS", "40"),
            ("CI_BRIDGE_SKIP_REPORTED", "true"),
            ("CI_BRIDGE_METRICS_ADDR", "127.0.0.1:9184"),
        ]);
        assert_eq!(config.obs_api_url, "http://localhost:3000");
        assert_eq!(config.poll_backoff, Duration::from_secs(7));
        assert_eq!(config.max_ticks, Some(40));
        assert!(config.skip_reported);
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9184".parse().unwrap()));
    }

    #[test]
    fn garbage_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("CI_BRIDGE_RETRY_BUDGET", "lots"),
            ("CI_BRIDGE_MAX_TICKS", "0"),
        ]);
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.max_ticks, None);
    }
}
