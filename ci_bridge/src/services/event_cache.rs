//! On-disk event backlog and fetch token, one pair per repository.
//!
//! Layout under the cache directory:
//!
//! ```text
//! <cache_dir>/<owner>/<repo>/events.json   backlog document
//! <cache_dir>/<owner>/<repo>/events.etag   conditional-fetch token
//! ```
//!
//! Both files are rewritten whole through a temp file and a rename, so a
//! reader sees either the previous or the next version. Missing or
//! unreadable files load as empty state.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::event::Event;

pub const SCHEMA_VERSION: u32 = 1;

const BACKLOG_FILE: &str = "events.json";
const TOKEN_FILE: &str = "events.etag";

/// Ordered events awaiting processing, keyed by event id.
///
/// New events are appended after the cached ones in feed order and
/// [`Backlog::pop`] takes from the end, so the most recently appended event
/// is processed first. Merging skips ids already present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Backlog {
    events: Vec<Event>,
    ids: HashSet<String>,
}

impl Backlog {
    pub fn new(events: Vec<Event>) -> Self {
        let mut backlog = Self::default();
        backlog.merge(events);
        backlog
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Append every event whose id is not already queued. Returns how many
    /// were added.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = Event>) -> usize {
        let before = self.events.len();
        for event in incoming {
            if !self.ids.insert(event.id.clone()) {
                tracing::debug!(event_id = %event.id, "event already queued");
                continue;
            }
            self.events.push(event);
        }
        self.events.len() - before
    }

    pub fn pop(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.ids.remove(&event.id);
        Some(event)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BacklogDocument {
    schema_version: u32,
    updated_at: DateTime<Utc>,
    events: Vec<Event>,
}

/// File-backed store for one repository's backlog and token.
#[derive(Debug, Clone)]
pub struct EventCacheStore {
    dir: PathBuf,
}

impl EventCacheStore {
    pub fn new(cache_dir: impl AsRef<Path>, owner: &str, repo: &str) -> Self {
        Self {
            dir: cache_dir.as_ref().join(owner).join(repo),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn backlog_path(&self) -> PathBuf {
        self.dir.join(BACKLOG_FILE)
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// Stored fetch token, if any.
    pub fn load_token(&self) -> Option<String> {
        match fs::read_to_string(self.token_path()) {
            Ok(raw) => {
                let token = raw.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.token_path().display(), "unreadable fetch token, ignoring: {e}");
                None
            }
        }
    }

    /// Replace the stored token. `None` removes it.
    pub fn save_token(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => write_atomic(&self.token_path(), token.as_bytes()),
            None => match fs::remove_file(self.token_path()) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Stored backlog; empty when absent or malformed.
    pub fn load_backlog(&self) -> Backlog {
        let path = self.backlog_path();
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Backlog::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "unreadable backlog, starting empty: {e}");
                return Backlog::default();
            }
        };

        match serde_json::from_slice::<BacklogDocument>(&raw) {
            Ok(doc) if doc.schema_version == SCHEMA_VERSION => Backlog::new(doc.events),
            Ok(doc) => {
                tracing::warn!(
                    path = %path.display(),
                    expected = SCHEMA_VERSION,
                    got = doc.schema_version,
                    "backlog schema mismatch, starting empty"
                );
                Backlog::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "malformed backlog, starting empty: {e}");
                Backlog::default()
            }
        }
    }

    pub fn save_backlog(&self, backlog: &Backlog) -> Result<()> {
        let doc = BacklogDocument {
            schema_version: SCHEMA_VERSION,
            updated_at: Utc::now(),
            events: backlog.events().to_vec(),
        };
        let encoded = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.backlog_path(), &encoded)
    }
}

/// Write-to-temp, fsync, rename, fsync directory.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "cache path has no parent"))?;
    fs::create_dir_all(dir)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    File::open(dir)?.sync_all()?;
    Ok(())
}
