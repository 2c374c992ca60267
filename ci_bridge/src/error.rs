//! Bridge error taxonomy.
//!
//! Every remote call funnels its failures into [`BridgeError`]. The split
//! between transient and permanent errors only matters to the build poller;
//! everywhere else an error aborts the current pipeline run.

use std::fmt;
use std::io;

use thiserror::Error;

/// The remote system a request was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remote {
    GitHub,
    Jenkins,
    Obs,
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Remote::GitHub => "github",
            Remote::Jenkins => "jenkins",
            Remote::Obs => "obs",
        })
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The remote answered with an unexpected HTTP status.
    #[error("{remote} returned HTTP {status} for {url}: {body}")]
    Http {
        remote: Remote,
        status: u16,
        url: String,
        body: String,
    },

    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("{remote} request failed: {source}")]
    Transport {
        remote: Remote,
        #[source]
        source: reqwest::Error,
    },

    /// A response body could not be decoded as JSON.
    #[error("{remote} sent malformed JSON: {source}")]
    Json {
        remote: Remote,
        #[source]
        source: serde_json::Error,
    },

    /// A build result document could not be decoded.
    #[error("malformed build result document: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// A response lacked a field the protocol requires.
    #[error("{remote} response missing {what}")]
    MissingField { remote: Remote, what: &'static str },

    /// Local cache I/O failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cache serialization failed.
    #[error("cache encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub fn transport(remote: Remote, source: reqwest::Error) -> Self {
        BridgeError::Transport { remote, source }
    }

    pub fn json(remote: Remote, source: serde_json::Error) -> Self {
        BridgeError::Json { remote, source }
    }

    /// HTTP status code, if the error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BridgeError::Http { status, .. } => Some(*status),
            BridgeError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether retrying the same request later could plausibly succeed.
    ///
    /// Server errors, rate limiting, transport failures and half-written
    /// documents are transient. Client errors and local I/O are not.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Transport { .. } | BridgeError::Xml(_) => true,
            BridgeError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            BridgeError::Json { .. }
            | BridgeError::MissingField { .. }
            | BridgeError::Io(_)
            | BridgeError::Encode(_) => false,
        }
    }
}

/// Turn a non-success response into [`BridgeError::Http`], keeping the body
/// for the log line.
pub(crate) async fn ensure_success(
    remote: Remote,
    resp: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(BridgeError::Http {
        remote,
        status: status.as_u16(),
        url,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> BridgeError {
        BridgeError::Http {
            remote: Remote::Obs,
            status,
            url: "https://api.example/build/p/_result".to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(http(500).is_transient());
        assert!(http(503).is_transient());
        assert!(http(429).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!http(401).is_transient());
        assert!(!http(404).is_transient());
        assert!(!BridgeError::MissingField {
            remote: Remote::Jenkins,
            what: "crumb",
        }
        .is_transient());
    }

    #[test]
    fn display_names_the_remote_and_status() {
        let msg = http(502).to_string();
        assert!(msg.starts_with("obs returned HTTP 502"));
        assert_eq!(http(502).status_code(), Some(502));
    }
}
