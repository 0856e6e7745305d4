//! Content archive: filtered post listings served through a TTL cache, with
//! CSV and Markdown export.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;
