//! GitHub repository events and the pull request view over their payload.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const PULL_REQUEST_EVENT: &str = "PullRequestEvent";

/// One entry of the repository events feed.
///
/// Only `id`, `type` and `payload` are interpreted; every other top-level
/// field is carried through `extra` so the cached copy matches the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// The pull request carried by a `PullRequestEvent`, if any.
    pub fn pull_request(&self) -> Option<PullRequest> {
        if self.kind != PULL_REQUEST_EVENT {
            return None;
        }
        let pr = self.payload.get("pull_request")?;
        match serde_json::from_value(pr.clone()) {
            Ok(pr) => Some(pr),
            Err(e) => {
                tracing::debug!(event_id = %self.id, "unreadable pull_request payload: {e}");
                None
            }
        }
    }

    /// Whether this event is an open pull request targeting `branch`.
    pub fn is_open_pull_request_for(&self, branch: &str) -> bool {
        self.pull_request()
            .map(|pr| pr.is_open() && pr.base.name == branch)
            .unwrap_or(false)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub base: GitRef,
    #[serde(default)]
    pub head: GitRef,
    #[serde(default)]
    pub statuses_url: Option<String>,
    #[serde(rename = "_links", default)]
    pub links: PullRequestLinks,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    /// Where commit statuses for the head commit live.
    pub fn statuses_href(&self) -> Option<&str> {
        self.links
            .statuses
            .as_ref()
            .map(|link| link.href.as_str())
            .or(self.statuses_url.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref", default)]
    pub name: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub repo: Option<RepoRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RepoRef {
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullRequestLinks {
    #[serde(default)]
    pub statuses: Option<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Link {
    pub href: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pr_event(id: u64, state: &str, base: &str) -> Value {
        json!({
            "id": id,
            "type": "PullRequestEvent",
            "actor": {"login": "octocat"},
            "payload": {
                "action": "opened",
                "pull_request": {
                    "url": format!("https://api.github.com/repos/o/r/pulls/{id}"),
                    "state": state,
                    "base": {"ref": base},
                    "head": {"ref": "feature", "sha": "abc123"},
                    "statuses_url": "https://api.github.com/repos/o/r/statuses/abc123",
                    "_links": {"statuses": {"href": "https://api.github.com/repos/o/r/statuses/abc123"}}
                }
            }
        })
    }

    #[test]
    fn numeric_ids_become_strings() {
        let event: Event = serde_json::from_value(pr_event(1, "open", "master")).unwrap();
        assert_eq!(event.id, "1");
        assert_eq!(event.kind, PULL_REQUEST_EVENT);
    }

    #[test]
    fn cache_round_trip_keeps_unknown_fields() {
        let event: Event = serde_json::from_value(pr_event(7, "open", "master")).unwrap();
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.extra["actor"]["login"], "octocat");
    }

    #[test]
    fn pull_request_view_reads_refs_and_links() {
        let event: Event = serde_json::from_value(pr_event(3, "open", "develop")).unwrap();
        let pr = event.pull_request().unwrap();
        assert_eq!(pr.base.name, "develop");
        assert_eq!(pr.head.name, "feature");
        assert_eq!(
            pr.statuses_href(),
            Some("https://api.github.com/repos/o/r/statuses/abc123")
        );
    }

    #[test]
    fn branch_and_state_filter() {
        let open: Event = serde_json::from_value(pr_event(1, "open", "master")).unwrap();
        let closed: Event = serde_json::from_value(pr_event(2, "closed", "master")).unwrap();
        assert!(open.is_open_pull_request_for("master"));
        assert!(!open.is_open_pull_request_for("develop"));
        assert!(!closed.is_open_pull_request_for("master"));
    }

    #[test]
    fn other_event_kinds_have_no_pull_request() {
        let push: Event = serde_json::from_value(json!({
            "id": "99",
            "type": "PushEvent",
            "payload": {"pull_request": {"state": "open", "base": {"ref": "master"}}}
        }))
        .unwrap();
        assert!(push.pull_request().is_none());
        assert!(!push.is_open_pull_request_for("master"));
    }
}
