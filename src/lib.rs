// src/lib.rs

//! Plugin Listing Service
//!
//! Aggregates third-party plugin repository manifests and GitHub release
//! metadata into a single queryable listing.
//!
//! # Architecture
//!
//! - In-memory stores behind RwLocks, persisted as JSON through a
//!   debounced writer
//! - One scheduled task per origin URL and per internal plugin, plus a
//!   sweeper that expires records whose origin stopped refreshing
//! - An axum server for the listing (JSON or HTML), prefix search,
//!   release changelogs, the private asset proxy and the release webhook

pub mod config;
mod error;
pub mod fetch;
pub mod jobs;
pub mod metrics;
pub mod server;
pub mod state;

pub use error::{Error, Result};
