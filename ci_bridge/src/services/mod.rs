//! Remote integrations and the pipelines built on them.

pub mod event_cache;
pub mod event_queue;
pub mod executor;
pub mod github_service;
pub mod jenkins_service;
pub mod obs_service;
pub mod poller;
pub mod remote;
pub mod service_file;
