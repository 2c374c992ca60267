//! OBS build results (`GET /build/<project>/_result`).
//!
//! The document is a `resultlist` with one `result` per repository and
//! architecture; each carries one `status` per package:
//!
//! ```xml
//! <resultlist state="c181538ad4f4b3b2f5e6cd6fb2b4a0a4">
//!   <result project="home:bot:salt-1" repository="openSUSE_Tumbleweed"
//!           arch="x86_64" code="building" state="building" dirty="true">
//!     <status package="salt" code="scheduled"/>
//!   </result>
//! </resultlist>
//! ```

use std::collections::BTreeSet;

use serde::Deserialize;

pub const CODE_BROKEN: &str = "broken";
pub const CODE_FAILED: &str = "failed";
pub const CODE_SUCCEEDED: &str = "succeeded";
pub const CODE_UNKNOWN: &str = "unknown";

/// One repository/architecture entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResultEntry {
    #[serde(rename = "@project", default)]
    pub project: String,
    #[serde(rename = "@repository", default)]
    pub repository: String,
    #[serde(rename = "@arch", default)]
    pub arch: String,
    /// Repository state code (`published`, `building`, `unknown`, ...).
    #[serde(rename = "@code", default)]
    pub code: String,
    #[serde(rename = "@dirty", default, deserialize_with = "xml_bool")]
    pub dirty: bool,
    #[serde(rename = "status", default)]
    pub statuses: Vec<PackageStatus>,
}

impl ResultEntry {
    /// Dirty or unknown entries have not settled yet.
    pub fn is_unready(&self) -> bool {
        self.dirty || self.code == CODE_UNKNOWN
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageStatus {
    #[serde(rename = "@package", default)]
    pub package: String,
    #[serde(rename = "@code")]
    pub code: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Snapshot of every result entry for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "resultlist")]
pub struct BuildResultAggregate {
    #[serde(rename = "@state", default)]
    pub state: Option<String>,
    #[serde(rename = "result", default)]
    pub results: Vec<ResultEntry>,
}

impl BuildResultAggregate {
    pub fn from_xml(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    /// Any entry still dirty or of unknown state.
    pub fn is_unready(&self) -> bool {
        self.results.iter().any(ResultEntry::is_unready)
    }

    /// Every package status code across all entries, in document order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .flat_map(|r| r.statuses.iter())
            .map(|s| s.code.as_str())
    }

    /// Distinct package status codes.
    pub fn distinct_codes(&self) -> BTreeSet<&str> {
        self.codes().collect()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes().any(|c| c == code)
    }

    /// True only when there is at least one status and all of them succeeded.
    pub fn all_succeeded(&self) -> bool {
        let mut codes = self.codes().peekable();
        codes.peek().is_some() && codes.all(|c| c == CODE_SUCCEEDED)
    }
}

fn xml_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(matches!(raw.trim(), "true" | "1"))
}
