//! OBS CI bridge.
//!
//! Watches a GitHub repository's events feed for pull requests, starts a
//! Jenkins job per pull request, and (inside that job) builds the pull
//! request's branch on the Open Build Service, reporting the result back
//! as a commit status.

pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
