//! Exactly-once work queue over the repository events feed.
//!
//! Each fetch is a conditional GET keyed by the stored token. Fresh pages are
//! filtered to open pull requests against the watched branch and merged into
//! the persisted backlog; "not modified" leaves everything on disk as is.
//! Events popped by this queue are never queued again, even when a later
//! page still lists them.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::event::Event;
use crate::services::event_cache::{Backlog, EventCacheStore};
use crate::services::remote::{EventFeed, FeedResponse};

/// Result of [`EventQueue::fetch_events`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// The backlog after the fetch, oldest first.
    pub events: Vec<Event>,
    /// False when the feed answered "not modified".
    pub changed: bool,
    /// Events newly added to the backlog by this fetch.
    pub added: usize,
}

pub struct EventQueue<F> {
    feed: F,
    store: EventCacheStore,
    owner: String,
    repo: String,
    branch: String,
    /// Ids handed out by [`EventQueue::pop_event`] during this run.
    popped: HashSet<String>,
}

impl<F: EventFeed> EventQueue<F> {
    pub fn new(
        feed: F,
        store: EventCacheStore,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            store,
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            popped: HashSet::new(),
        }
    }

    pub fn store(&self) -> &EventCacheStore {
        &self.store
    }

    /// Conditionally fetch the feed and merge relevant events into the
    /// backlog. Feed errors are returned as-is; nothing is retried here.
    pub async fn fetch_events(&self) -> Result<FetchOutcome> {
        let token = self.store.load_token();
        let response = self
            .feed
            .fetch(&self.owner, &self.repo, token.as_deref())
            .await?;

        match response {
            FeedResponse::NotModified => {
                crate::metrics::feed_not_modified();
                Ok(FetchOutcome {
                    events: self.store.load_backlog().into_events(),
                    changed: false,
                    added: 0,
                })
            }
            FeedResponse::Fresh { token, events } => {
                let fetched = events.len();
                let relevant: Vec<Event> = events
                    .into_iter()
                    .filter(|e| e.is_open_pull_request_for(&self.branch))
                    .filter(|e| {
                        let handled = self.popped.contains(&e.id);
                        if handled {
                            tracing::debug!(event_id = %e.id, "event already handled this run");
                        }
                        !handled
                    })
                    .collect();

                let mut backlog = self.store.load_backlog();
                let added = backlog.merge(relevant);

                // Backlog first: if we die before the token is written the
                // next run refetches and the merge drops the duplicates.
                self.store.save_backlog(&backlog)?;
                self.store.save_token(token.as_deref())?;

                crate::metrics::events_fetched(added);
                tracing::info!(
                    owner = %self.owner,
                    repo = %self.repo,
                    fetched,
                    added,
                    queued = backlog.len(),
                    "Events feed refreshed"
                );

                Ok(FetchOutcome {
                    events: backlog.into_events(),
                    changed: true,
                    added,
                })
            }
        }
    }

    /// Remove and return the most recently appended event, or `None` when
    /// the backlog is empty.
    pub fn pop_event(&mut self) -> Result<Option<Event>> {
        let mut backlog: Backlog = self.store.load_backlog();
        let Some(event) = backlog.pop() else {
            return Ok(None);
        };
        self.store.save_backlog(&backlog)?;
        self.popped.insert(event.id.clone());
        tracing::debug!(event_id = %event.id, remaining = backlog.len(), "popped event");
        Ok(Some(event))
    }
}
