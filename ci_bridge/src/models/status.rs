//! Commit statuses reported on pull requests.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a status POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub state: CommitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub description: String,
    pub context: String,
}

impl StatusUpdate {
    pub fn new(state: CommitState, description: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            state,
            target_url: None,
            description: description.into(),
            context: context.into(),
        }
    }

    /// Attach a target URL; empty strings are dropped.
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.target_url = (!url.is_empty()).then_some(url);
        self
    }
}

/// A status already recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitStatus {
    #[serde(default)]
    pub id: Option<u64>,
    pub state: CommitState,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
}

/// What the status API hands back after a successful POST.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusAck {
    /// `Location` of the created status, when the API returned one.
    pub location: Option<String>,
}
